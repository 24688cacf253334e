use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Measurement words stripped after a leading quantity.
const UNITS: &[&str] = &[
    "cups?",
    "c",
    "tablespoons?",
    "tbsps?",
    "tbs",
    "tbl",
    "teaspoons?",
    "tsps?",
    "ounces?",
    "oz",
    "fl oz",
    "pounds?",
    "lbs?",
    "grams?",
    "g",
    "kilograms?",
    "kgs?",
    "milligrams?",
    "mg",
    "milliliters?",
    "millilitres?",
    "ml",
    "liters?",
    "litres?",
    "l",
    "pints?",
    "pt",
    "quarts?",
    "qt",
    "gallons?",
    "gal",
    "cans?",
    "packages?",
    "sticks?",
    "pinch(?:es)?",
    "dash(?:es)?",
];

fn quantity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // number, optional decimal or fraction, optional mixed fraction or
        // range ("1 1/2", "2-3"), then an optional unit word
        let number = r"(?:\d+(?:\.\d+)?(?:\s*/\s*\d+)?|[½⅓⅔¼¾⅛])";
        let pattern = format!(
            r"^\s*{number}(?:\s*[-–]\s*{number}|\s+\d+\s*/\s*\d+|[½⅓⅔¼¾⅛])?\s*(?:(?:{units})\b\.?)?\s*",
            units = UNITS.join("|"),
        );
        Regex::new(&pattern).expect("quantity pattern is a valid regex")
    })
}

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)?").expect("parenthetical pattern is a valid regex"))
}

/// Reduce a raw ingredient line ("2 tbsp olive oil, chopped") to its
/// searchable name ("olive oil").
///
/// The result is a fixed point: `normalize(&normalize(s)) == normalize(s)`.
/// An empty result means the line carried no searchable content.
pub fn normalize(raw: &str) -> String {
    // each pass only removes text, so this reaches a fixed point
    let mut current = single_pass(raw);
    loop {
        let next = single_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Normalize an untyped ingredient value as it arrives from the store.
/// Anything that is not a string normalizes to the empty string.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::String(s) => normalize(s),
        _ => String::new(),
    }
}

fn single_pass(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let without_quantity = quantity_re().replace(&lowered, "");
    let without_parens = parenthetical_re().replace_all(&without_quantity, " ");
    let head = match without_parens.find(',') {
        Some(pos) => &without_parens[..pos],
        None => &without_parens[..],
    };

    let spaced: String = head
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
