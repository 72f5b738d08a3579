#[macro_use]
extern crate quote;
#[macro_use]
extern crate syn;

use syn::DeriveInput;

use proc_macro::TokenStream;

/// Implements `sessionflow::api::function::NamedFunction`, naming the function after its type.
#[proc_macro_derive(Function)]
pub fn derive_function(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let (im, ty, wh) = input.generics.split_for_impl();
    let expanded = quote! {
        impl #im sessionflow::api::function::NamedFunction for #name #ty #wh {
            fn name(&self) -> &str {
                stringify!(#name)
            }
        }
    };

    TokenStream::from(expanded)
}
