//! Names derived from type names

/// Snake-cased last path segment of `type_name` with `suffix` removed
///
/// `aprendiz::train::TrainEvalCallback` with suffix `Callback` gives
/// `train_eval`. A type named exactly `suffix` gives the suffix lowercased.
pub fn class2attr(type_name: &str, suffix: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let short = base.rsplit("::").next().unwrap_or(base);
    match short.strip_suffix(suffix) {
        Some("") => suffix.to_lowercase(),
        Some(stripped) => camel2snake(stripped),
        None => camel2snake(short),
    }
}

/// `GatherPreds` -> `gather_preds`, `LRFinder` -> `lr_finder`
pub fn camel2snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel2snake() {
        assert_eq!(camel2snake("GatherPreds"), "gather_preds");
        assert_eq!(camel2snake("Recorder"), "recorder");
        assert_eq!(camel2snake("LRFinder"), "lr_finder");
        assert_eq!(camel2snake("already_snake"), "already_snake");
    }

    #[test]
    fn test_class2attr() {
        assert_eq!(
            class2attr("aprendiz::train::TrainEvalCallback", "Callback"),
            "train_eval"
        );
        assert_eq!(class2attr("my_crate::Recorder", "Callback"), "recorder");
        assert_eq!(class2attr("Callback", "Callback"), "callback");
        assert_eq!(class2attr("m::Wrapper<m::Inner>", "Callback"), "wrapper");
    }
}
