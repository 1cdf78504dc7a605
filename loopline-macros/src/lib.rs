use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Runs the body of `fn main` as the first callback of an event loop pumped
/// by the main thread.
///
/// The program returns once the loop is stopped, typically through
/// `loopline::current()` and `post_stop_event`.
#[proc_macro_attribute]
pub fn main(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let Some((pos, block)) = body(&tokens) else {
        return compile_error("#[loopline::main] expects a function with a body");
    };

    let new_block = format!(
        "{{
            ::loopline::__private::run_main(move || {{
                {}
            }});
        }}",
        block
    );

    replace_body(&mut tokens, pos, &new_block)
}

/// Turns a function into a `#[test]` whose body runs on the consumer thread
/// of a freshly launched event loop.
#[proc_macro_attribute]
pub fn test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let Some((pos, block)) = body(&tokens) else {
        return compile_error("#[loopline::test] expects a function with a body");
    };

    let new_block = format!(
        "{{
            ::loopline::__private::block_on_loop(move || {{ {} }});
        }}",
        block
    );

    let wrapped = replace_body(&mut tokens, pos, &new_block);

    let mut result: TokenStream = "#[test]".parse().unwrap_or_default();
    result.extend(wrapped);
    result
}

/// Finds the function body: the last brace-delimited group.
fn body(tokens: &[TokenTree]) -> Option<(usize, String)> {
    let pos = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))?;

    match &tokens[pos] {
        TokenTree::Group(g) => Some((pos, g.stream().to_string())),
        _ => None,
    }
}

fn replace_body(tokens: &mut Vec<TokenTree>, pos: usize, block: &str) -> TokenStream {
    let stream = match block.parse::<TokenStream>() {
        Ok(stream) => stream,
        Err(err) => return compile_error(&format!("loopline macro error: {err}")),
    };

    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream));
    tokens.drain(..).collect()
}

fn compile_error(msg: &str) -> TokenStream {
    format!("compile_error!({msg:?});").parse().unwrap_or_default()
}
