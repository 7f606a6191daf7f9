/// Normalize an arbitrary model group name into a DNS-1123 label: lowercase, `_`/`.`/space
/// collapsed to `-`, any other non `[a-z0-9-]` byte dropped, leading/trailing `-` trimmed, and
/// truncated to 63 characters.
///
/// This is the single place that decides what a group is called on the wire (object names,
/// label values, storage prefixes), so every other component treats a `ModelGroup::name` as
/// already-kubified and never re-derives it.
pub fn kubify_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_dash = false;
    for ch in raw.chars() {
        let lower = ch.to_ascii_lowercase();
        let mapped = match lower {
            'a'..='z' | '0'..='9' => Some(lower),
            '-' | '_' | '.' | ' ' => Some('-'),
            _ => None,
        };
        match mapped {
            Some('-') => {
                if !prev_dash && !out.is_empty() {
                    out.push('-');
                    prev_dash = true;
                }
            }
            Some(c) => {
                out.push(c);
                prev_dash = false;
            }
            None => {}
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out.truncate(63);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_dashes() {
        assert_eq!(kubify_name("Llama_3 Model"), "llama-3-model");
    }

    #[test]
    fn collapses_repeated_separators() {
        assert_eq!(kubify_name("a___b..c  d"), "a-b-c-d");
    }

    #[test]
    fn trims_edge_dashes() {
        assert_eq!(kubify_name("--weird--"), "weird");
    }

    #[test]
    fn drops_disallowed_bytes() {
        assert_eq!(kubify_name("model@v1.0!"), "model-v1-0");
    }

    #[test]
    fn truncates_to_63_without_trailing_dash() {
        let long = "a".repeat(70);
        let got = kubify_name(&long);
        assert_eq!(got.len(), 63);
        assert!(!got.ends_with('-'));
    }

    #[test]
    fn is_idempotent() {
        let once = kubify_name("My Model_Name--v2");
        let twice = kubify_name(&once);
        assert_eq!(once, twice);
    }
}
