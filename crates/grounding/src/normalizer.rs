use regex::Regex;

/// Re-insert the spaces upstream models drop around monetary figures and
/// unit words ("50million", "$3billion in", "2021Acme"). Cosmetic only: it
/// never reorders or removes content.
pub fn normalize_spacing(text: &str) -> String {
    let re = Regex::new(r"(\d+)(million|billion|Million|Billion)").unwrap();
    let text = re.replace_all(text, "$1 $2");

    let re = Regex::new(r"(\$\d+)([a-zA-Z])").unwrap();
    let text = re.replace_all(&text, "$1 $2");

    let re = Regex::new(r"([0-9]+)([a-zA-Z]+)([0-9]+)").unwrap();
    let text = re.replace_all(&text, "$1 $2 $3");

    let re = Regex::new(r"(\d)([A-Z][a-z])").unwrap();
    let text = re.replace_all(&text, "$1 $2");

    text.into_owned()
}
