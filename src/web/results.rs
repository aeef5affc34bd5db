use crate::{presenter::DisplayModel, web::escape_html};

/// Items as a table, anything else verbatim in a `<pre>` block.
pub fn render_result(model: &DisplayModel) -> String {
    match model {
        DisplayModel::Items(items) if items.is_empty() => {
            r#"<p class="note">No items were found on this receipt.</p>"#.to_string()
        }
        DisplayModel::Items(items) => {
            let rows = items
                .iter()
                .map(|item| {
                    format!(
                        "<tr><td>{name}</td><td>{quantity}</td><td>${price:.2}</td></tr>",
                        name = escape_html(&item.item_name),
                        quantity = item.quantity,
                        price = item.price,
                    )
                })
                .collect::<String>();
            format!(
                r#"<table class="items-table"><thead><tr><th>Item</th><th>Qty</th><th>Price</th></tr></thead><tbody>{rows}</tbody></table>"#
            )
        }
        DisplayModel::Raw(text) => {
            format!(r#"<pre class="raw-result">{}</pre>"#, escape_html(text))
        }
    }
}
