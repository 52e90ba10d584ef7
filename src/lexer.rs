//! Splitting of a single stage into argument tokens.

/// Splits a command string into argument tokens.
///
/// The space character is the only delimiter; tabs and every other character are
/// part of a token. A double quote opens a span that runs to the next double quote
/// (or to the end of the input) and becomes exactly one token with the quotes
/// removed. A single space following a closing quote is swallowed so that quoted
/// tokens sit in the space-delimited scheme like any other word.
///
/// Consecutive spaces produce empty tokens. A trailing delimiter does not.
///
/// # Example
/// ```
/// use myshell::lexer::tokenize;
/// assert_eq!(tokenize(r#"echo "a b" c"#), vec!["echo", "a b", "c"]);
/// ```
pub fn tokenize(input: &str) -> Vec<String> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b' ' => {
                tokens.push(input[start..i].to_string());
                start = i + 1;
            }
            b'"' => {
                let open = i + 1;
                i = open;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += 1;
                }
                tokens.push(input[open..i].to_string());

                // step over the closing quote and at most one space after it
                i += 1;
                if i < bytes.len() && bytes[i] == b' ' {
                    i += 1;
                }
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    if start < bytes.len() {
        tokens.push(input[start..].to_string());
    }

    tokens
}
