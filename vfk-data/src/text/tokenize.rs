/// Split a record body on `;`, keeping delimiters inside double quotes.
///
/// One leading and one trailing quote are stripped from each field; there is
/// no other escaping.
///
/// ```
/// use vfk_data::split_fields;
///
/// assert_eq!(split_fields(r#"1;"a;b";;x"#), vec!["1", "a;b", "", "x"]);
/// ```
#[must_use]
pub fn split_fields(body: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (at, ch) in body.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                fields.push(strip_quotes(body.get(start..at).unwrap_or_default()));
                start = at + 1;
            }
            _ => {}
        }
    }
    fields.push(strip_quotes(body.get(start..).unwrap_or_default()));
    fields
}

fn strip_quotes(field: &str) -> &str {
    let field = field.strip_prefix('"').unwrap_or(field);
    field.strip_suffix('"').unwrap_or(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", vec![""])]
    #[case("a", vec!["a"])]
    #[case("a;", vec!["a", ""])]
    #[case(r#""Kraví hora";12"#, vec!["Kraví hora", "12"])]
    #[case(r#""";"""#, vec!["", ""])]
    #[case(r#""x;y;z""#, vec!["x;y;z"])]
    fn fields_split_outside_quotes(#[case] body: &str, #[case] expected: Vec<&str>) {
        assert_eq!(split_fields(body), expected);
    }
}
