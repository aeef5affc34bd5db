use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_name: String,
    pub quantity: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DisplayModel {
    Items(Vec<LineItem>),
    Raw(String),
}

/// Turn whatever the backend produced into something displayable. Never fails.
pub fn render(raw: &str) -> DisplayModel {
    if let Some(items) = parse_json_items(raw) {
        return DisplayModel::Items(items);
    }
    if let Some(items) = parse_item_lines(raw) {
        return DisplayModel::Items(items);
    }
    DisplayModel::Raw(raw.to_string())
}

/// Render the `items` field of a backend reply, whether it arrived as a JSON
/// array or as the older plain-text listing.
pub fn render_value(items: &Value) -> DisplayModel {
    match items {
        Value::String(text) => render(text),
        other => render(&other.to_string()),
    }
}

fn parse_json_items(raw: &str) -> Option<Vec<LineItem>> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    let array = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove("items")?,
        _ => return None,
    };
    serde_json::from_value(array).ok()
}

/// Parses lines of the form `2 x Coffee - $3.50`.
fn parse_item_lines(raw: &str) -> Option<Vec<LineItem>> {
    let items = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_item_line)
        .collect::<Option<Vec<_>>>()?;

    if items.is_empty() { None } else { Some(items) }
}

fn parse_item_line(line: &str) -> Option<LineItem> {
    let (quantity_and_name, price) = line.rsplit_once('-')?;
    let (quantity, name) = quantity_and_name.split_once('x')?;

    let quantity = quantity.trim().parse::<f64>().ok()?;
    let price = price
        .trim()
        .trim_start_matches('$')
        .replace(',', "")
        .parse::<f64>()
        .ok()?;
    let item_name = name.trim();
    if item_name.is_empty() {
        return None;
    }

    Some(LineItem {
        item_name: item_name.to_string(),
        quantity,
        price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_structured_items() {
        let model = render(r#"[{"item_name":"Coffee","quantity":1,"price":3.5}]"#);
        assert_eq!(
            model,
            DisplayModel::Items(vec![LineItem {
                item_name: "Coffee".into(),
                quantity: 1.0,
                price: 3.5,
            }])
        );
    }

    #[test]
    fn parses_wrapped_items_object() {
        let model = render(r#"{"items":[{"item_name":"Tea","quantity":2,"price":1.25}]}"#);
        assert!(matches!(model, DisplayModel::Items(ref items) if items[0].item_name == "Tea"));
    }

    #[test]
    fn parses_plain_text_listing() {
        let model = render("2 x Oat Milk - $3.99\n1 x Bread - $2.50\n");
        let DisplayModel::Items(items) = model else {
            panic!("expected items");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_name, "Oat Milk");
        assert_eq!(items[0].quantity, 2.0);
        assert_eq!(items[1].price, 2.5);
    }

    #[test]
    fn malformed_input_falls_back_to_raw() {
        let raw = "{not json at all";
        assert_eq!(render(raw), DisplayModel::Raw(raw.to_string()));
        assert_eq!(render(""), DisplayModel::Raw(String::new()));
        assert_eq!(
            render(r#"[{"item_name": 3}]"#),
            DisplayModel::Raw(r#"[{"item_name": 3}]"#.to_string())
        );
    }

    #[test]
    fn partially_parseable_listing_stays_raw() {
        let raw = "2 x Coffee - $3.00\nThanks for shopping!";
        assert_eq!(render(raw), DisplayModel::Raw(raw.to_string()));
    }

    #[test]
    fn render_value_accepts_strings_and_arrays() {
        let text = Value::String("1 x Bagel - $2.00".into());
        assert!(matches!(render_value(&text), DisplayModel::Items(_)));

        let array = serde_json::json!([{ "item_name": "Bagel", "quantity": 1, "price": 2.0 }]);
        assert!(matches!(render_value(&array), DisplayModel::Items(_)));

        assert_eq!(render_value(&Value::Null), DisplayModel::Raw("null".into()));
    }
}
