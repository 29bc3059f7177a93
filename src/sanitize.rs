/// Characters allowed to survive into a filename. Matches what the output
/// side expects: ASCII letters/digits, space, `-_.()#`, and the accented
/// Latin letters that show up in Spanish-language titles.
const VALID_CHARS: &str =
    "-_.() abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789áéíóúÁÉÍÓÚñÑ#";

/// Strips a string down to the allow-listed subsequence. Order is preserved,
/// nothing is replaced or truncated, and the result may be empty.
///
/// Both the name recorder and the worker derive filenames from this, so it
/// must stay a pure function of its input.
pub fn clean_filename(raw: &str) -> String {
    raw.chars().filter(|c| VALID_CHARS.contains(*c)).collect()
}
