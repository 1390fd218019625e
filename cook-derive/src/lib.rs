use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{quote, ToTokens};
use syn::{Attribute, Data, DeriveInput, Fields, Ident, Index};

#[proc_macro_derive(ObjectTraversal, attributes(skip))]
pub fn derive_object_traversal(token_stream: TokenStream) -> TokenStream {
    let ast = match syn::parse::<DeriveInput>(token_stream) {
        Ok(ast) => ast,
        Err(e) => return e.to_compile_error().into(),
    };

    let name = &ast.ident;

    let body = match &ast.data {
        Data::Struct(data) => struct_body(&data.fields),
        Data::Enum(data) => {
            let arms = data.variants.iter().map(|variant| {
                let variant_name = &variant.ident;
                match &variant.fields {
                    Fields::Named(named) => {
                        let fields: Vec<&Ident> = named
                            .named
                            .iter()
                            .filter_map(|f| f.ident.as_ref())
                            .collect();
                        let visited = named
                            .named
                            .iter()
                            .filter(|f| !is_skipped(&f.attrs))
                            .filter_map(|f| f.ident.as_ref());

                        quote! {
                            #name::#variant_name { #(#fields),* } => {
                                #(::cook_utils::ObjectTraversal::traverse(#visited, walker);)*
                            }
                        }
                    }

                    Fields::Unnamed(unnamed) => {
                        let bindings: Vec<Ident> = (0..unnamed.unnamed.len())
                            .map(|idx| Ident::new(&format!("f{}", idx), Span::call_site()))
                            .collect();
                        let visited = unnamed
                            .unnamed
                            .iter()
                            .zip(bindings.iter())
                            .filter(|(f, _)| !is_skipped(&f.attrs))
                            .map(|(_, b)| b);

                        quote! {
                            #name::#variant_name(#(#bindings),*) => {
                                #(::cook_utils::ObjectTraversal::traverse(#visited, walker);)*
                            }
                        }
                    }

                    Fields::Unit => quote! {
                        #name::#variant_name => {}
                    },
                }
            });

            quote! {
                #[allow(unused_variables)]
                match self {
                    #(#arms),*
                }
            }
        }

        Data::Union(data) => {
            return syn::Error::new_spanned(
                data.union_token,
                "ObjectTraversal cannot be derived for unions",
            )
            .to_compile_error()
            .into()
        }
    };

    let q = quote! {
        impl ::cook_utils::ObjectTraversal for #name {
            fn traverse<W: ::cook_utils::ObjectWalker>(&mut self, walker: &mut W) {
                #body
            }
        }
    };

    q.into()
}

fn struct_body(fields: &Fields) -> TokenStream2 {
    let visits = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| !is_skipped(&f.attrs))
        .map(|(idx, f)| {
            let access = match &f.ident {
                Some(ident) => ident.to_token_stream(),
                None => Index::from(idx).to_token_stream(),
            };

            quote! { ::cook_utils::ObjectTraversal::traverse(&mut self.#access, walker); }
        });

    quote! { #(#visits)* }
}

fn is_skipped(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| attr.path.is_ident("skip"))
}
