use crate::definition::Recipe;
use crate::error::{CookError, CookResult};
use cook_utils::{ObjectTraversal, ObjectWalker};
use handlebars::Handlebars;
use serde::Serialize;

/// Renders every string of a value as a handlebars template against `vars`.
pub struct TemplateReplace<'a, V: Serialize> {
    engine: Handlebars<'a>,
    vars: &'a V,
    error: Option<CookError>,
}

impl<'a, V: Serialize> TemplateReplace<'a, V> {
    pub fn new(vars: &'a V) -> Self {
        let mut engine = Handlebars::new();
        engine.set_strict_mode(true);
        engine.register_escape_fn(handlebars::no_escape);

        TemplateReplace {
            engine,
            vars,
            error: None,
        }
    }

    pub fn finish(self) -> CookResult<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<V: Serialize> ObjectWalker for TemplateReplace<'_, V> {
    fn enter_string(&mut self, value: &mut String) {
        if self.error.is_some() || !value.contains("{{") {
            return;
        }

        match self.engine.render_template(value, self.vars) {
            Ok(rendered) => *value = rendered,
            Err(e) => {
                self.error = Some(CookError::Template {
                    template: value.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Expands `{{name}}`, `{{version}}`, `{{reference}}` and `{{description}}` in the recipe strings.
pub fn expand_recipe(recipe: &mut Recipe) -> CookResult<()> {
    let vars = recipe.template_vars();
    let mut walker = TemplateReplace::new(&vars);
    recipe.traverse(&mut walker);
    walker.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::parsing::ParseDocument;
    use crate::definition::Document;

    #[test]
    fn expands_recipe_strings() {
        let doc = Document::parse_source(
            r#"
recipe "math" {
    version "0.0.2"
    description "{{name}} {{version}}"
    url "https://github.com/Adnn/{{name}}"
}
"#,
            None,
        )
        .unwrap();

        let mut recipe = doc.recipes[0].clone();
        expand_recipe(&mut recipe).unwrap();
        assert_eq!(recipe.description, "math 0.0.2");
        assert_eq!(recipe.url.as_deref(), Some("https://github.com/Adnn/math"));
    }

    #[test]
    fn unknown_variables_are_errors() {
        let doc = Document::parse_source(
            r#"
recipe "math" {
    version "1"
    description "{{author}}"
}
"#,
            None,
        )
        .unwrap();

        let mut recipe = doc.recipes[0].clone();
        assert!(matches!(
            expand_recipe(&mut recipe),
            Err(CookError::Template { .. })
        ));
    }
}
