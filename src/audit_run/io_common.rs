use std::path::Path;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

pub fn make_default_id(path: &str) -> impl Fn(usize) -> String {
    let simplified_file_name = simplify_file_name(path);
    move |lineno| format!("{}-{:08}", simplified_file_name, lineno)
}

/// The candidate names in order of first appearance in the ballots.
pub fn candidates_from_ballots(ballots: &[super::ParsedBallot]) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for pb in ballots.iter() {
        for name in pb.choices.iter().filter(|s| !s.is_empty()) {
            if !res.contains(name) {
                res.push(name.clone());
            }
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("/a/b/ballots.csv"), "ballots.csv");
        assert_eq!(simplify_file_name("ballots.csv"), "ballots.csv");
        assert_eq!(make_default_id("dir/x.csv")(12), "x.csv-00000012");
    }
}
