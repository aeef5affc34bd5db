use std::borrow::Cow;

use chrono::{Datelike, Utc};

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f3f4f6; color: #0f172a; min-height: 100vh; display: flex; flex-direction: column; align-items: center; }
        header { width: 100%; background: #ffffff; padding: 1.5rem; border-bottom: 1px solid #e2e8f0; box-sizing: border-box; }
        .header-bar { max-width: 640px; margin: 0 auto; display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .header-bar h1 { margin: 0; font-size: 1.5rem; }
        main { padding: 2rem 1.5rem; width: 100%; max-width: 640px; box-sizing: border-box; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); margin-bottom: 1.5rem; }
        .panel h2 { margin-top: 0; font-size: 1.2rem; }
        label { font-weight: 600; color: #0f172a; }
        input[type="checkbox"] { margin-right: 0.5rem; }
        button, .button-link { padding: 0.75rem 1.2rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; text-decoration: none; display: inline-block; transition: background 0.15s ease; }
        button:hover, .button-link:hover { background: #1d4ed8; }
        button:disabled { opacity: 0.6; cursor: not-allowed; }
        button.secondary { background: #e2e8f0; color: #0f172a; }
        button.secondary:hover { background: #cbd5e1; }
        .wide { width: 100%; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .flash { padding: 0.9rem 1.1rem; border-radius: 10px; margin-bottom: 1rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.info { background: #eff6ff; border-color: #bfdbfe; color: #1d4ed8; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .app-footer { margin-top: 2rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
        @media (max-width: 768px) {
            header { padding: 1rem; }
            main { padding: 1.5rem 1rem; }
            .header-bar { flex-direction: column; align-items: flex-start; }
        }
"#;

pub struct PageLayout<'a> {
    pub meta_title: &'a str,
    pub page_heading: &'a str,
    pub header_actions_html: Cow<'a, str>,
    pub body_html: Cow<'a, str>,
    pub extra_style_blocks: Vec<Cow<'a, str>>,
    pub body_scripts: Vec<Cow<'a, str>>,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        meta_title,
        page_heading,
        header_actions_html,
        body_html,
        extra_style_blocks,
        body_scripts,
    } = layout;

    let styles = std::iter::once(Cow::Borrowed(PAGE_BASE_STYLES))
        .chain(extra_style_blocks)
        .map(Cow::into_owned)
        .collect::<Vec<_>>()
        .join("\n");

    let scripts = body_scripts
        .into_iter()
        .map(Cow::into_owned)
        .collect::<Vec<_>>()
        .join("\n");

    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{meta_title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{page_heading}</h1>
            <div style="display:flex; gap:0.75rem; align-items:center; flex-wrap:wrap;">
                {header_actions_html}
            </div>
        </div>
    </header>
    <main>
{body_html}
        {footer}
    </main>
{scripts}
</body>
</html>"#,
        meta_title = escape_html(meta_title),
        page_heading = escape_html(page_heading),
    )
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} Receipt OCR · items extracted by the receipt service</footer>"#,
        year = current_year
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn page_embeds_title_body_and_scripts() {
        let html = render_page(PageLayout {
            meta_title: "Receipts <dev>",
            page_heading: "Receipt OCR",
            header_actions_html: Cow::Borrowed(""),
            body_html: Cow::Borrowed("<section id=\"body\"></section>"),
            extra_style_blocks: vec![Cow::Borrowed(".x { color: red; }")],
            body_scripts: vec![Cow::Borrowed("<script>1</script>")],
        });

        assert!(html.contains("<title>Receipts &lt;dev&gt;</title>"));
        assert!(html.contains("<section id=\"body\"></section>"));
        assert!(html.contains(".x { color: red; }"));
        assert!(html.contains("<script>1</script>"));
        assert!(html.contains("app-footer"));
    }
}
