//! Command-line and environment-block encoding for the native spawn call.
//!
//! The quoting rule in [`join_args`] mirrors what the native spawn API
//! undoes when it splits a command line back into arguments, so it has to
//! stay exactly as it is.

/// Join `args` into one command line.
///
/// Arguments are separated by a single space. An argument containing a space
/// or a tab that does not already start with `"` is wrapped in double quotes;
/// if it ends in a backslash, one more backslash is added so the closing
/// quote is not escaped.
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    let mut cmd = String::new();
    for (i, arg) in args.iter().enumerate() {
        let arg = arg.as_ref();
        if i > 0 {
            cmd.push(' ');
        }

        let needs_quotes = arg.contains(' ') || arg.contains('\t');
        if needs_quotes && !arg.starts_with('"') {
            cmd.push('"');
            cmd.push_str(arg);
            if arg.ends_with('\\') {
                cmd.push('\\');
            }
            cmd.push('"');
        } else {
            cmd.push_str(arg);
        }
    }
    cmd
}

/// Flatten environment pairs into a native environment block.
///
/// Each entry becomes `KEY=VALUE\0`, in the order given, and the block ends
/// with one more `\0`. Duplicate keys are kept as they are.
pub fn flatten_env<I, K, V>(vars: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut block = String::new();
    for (key, value) in vars {
        block.push_str(key.as_ref());
        block.push('=');
        block.push_str(value.as_ref());
        block.push('\0');
    }
    block.push('\0');
    block
}

/// Split a native environment block back into `(key, value)` pairs.
///
/// Stops at the first empty entry. Entries without `=` are skipped. A
/// leading `=` belongs to the key, as in the per-drive `=C:` entries.
pub fn parse_env_block(block: &str) -> Vec<(String, String)> {
    block
        .split('\0')
        .take_while(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let split_at = entry
                .char_indices()
                .skip(1)
                .find(|&(_, c)| c == '=')
                .map(|(i, _)| i)?;
            let (key, value) = entry.split_at(split_at);
            Some((key.to_string(), value[1..].to_string()))
        })
        .collect()
}
