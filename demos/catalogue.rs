//! A product catalogue rendered from a data stack
//!
//! Shows scalar content, attribute directives, repeated list items with
//! different repeat functions, render controls and the query log.
//!
//! Run with: RUST_LOG=debug cargo run --example catalogue

use html_datastack::{EmptyContentPolicy, HtmlTemplate, HtmlTemplateBuilder, TemplateConfig};
use serde_json::json;

const CATALOGUE: &str = r#"
<!DOCTYPE html>
<html>
<head><title></title></head>
<body>
    <header>
        <h1 class="shop"></h1>
        <p class="notice">Prices may change</p>
    </header>
    <main>
        <section class="product">
            <h2></h2>
            <p class="price"></p>
            <ul class="features">
                <li class="odd"></li>
                <li class="even"></li>
            </ul>
            <a class="buy">Buy</a>
        </section>
    </main>
    <footer><span class="updated"></span></footer>
</body>
</html>
"#;

fn main() -> html_datastack::Result<()> {
    env_logger::init();

    println!("=== html-datastack catalogue ===\n");

    product_listing()?;
    striped_rows()?;
    builder_with_stats()?;

    Ok(())
}

fn product_listing() -> html_datastack::Result<()> {
    println!("1. Products with nested data");
    println!("============================");

    let config = TemplateConfig::default().with_on_content_empty(EmptyContentPolicy::NoRender);
    let mut template = HtmlTemplate::from_str_with_config(CATALOGUE, config)?;

    template.assign_all(json!({
        "title": "Widgets & Co",
        "h1.shop": "Widgets & Co",
        "p.notice": {"@render": false},
        "section.product": {
            "@repeat": [
                {
                    "h2": "Sprocket",
                    "p.price": "<strong>£4.99</strong>",
                    "ul.features": ["Steel", "Rust proof", "Lifetime warranty"],
                    "a.buy": {"@attr": {"href": "/buy/sprocket"}}
                },
                {
                    "h2": "Flange",
                    "p.price": "£2.50",
                    "ul.features": ["Brass"],
                    "a.buy": {"@attr": {"href": "/buy/flange"}}
                }
            ]
        },
        "span.updated": ""
    }))?;

    println!("{}\n", template.rendered(Some("main"))?);

    for record in template.queries().iter().take(5) {
        println!("{}", record);
    }
    println!();
    Ok(())
}

fn striped_rows() -> html_datastack::Result<()> {
    println!("2. Alternating rows with repeat-all");
    println!("===================================");

    let html = r#"<table><tr class="odd"><td></td></tr><tr class="even"><td></td></tr></table>"#;
    let rows: Vec<serde_json::Value> = (1..=5)
        .map(|i| json!({"td": format!("Row {}", i)}))
        .collect();

    let mut template = HtmlTemplate::from_str_with_config(
        html,
        TemplateConfig::default().with_repeat_fn("repeat-all"),
    )?;
    template.assign("tbody", json!(rows))?;

    println!("{}\n", template.rendered(Some("table"))?);
    Ok(())
}

fn builder_with_stats() -> html_datastack::Result<()> {
    println!("3. Builder and render statistics");
    println!("================================");

    let result = HtmlTemplateBuilder::new()
        .from_str(r#"<nav><a class="item"></a></nav>"#)
        .with_html_formatting(true)
        .assign(
            "nav",
            json!([
                {"@content": "Home", "@attr": {"href": "/"}},
                {"@content": "Catalogue", "@attr": {"href": "/catalogue"}},
                {"@content": "Contact", "@attr": {"href": "/contact"}}
            ]),
        )
        .assign("a.item", json!({"@import::after": "file:/no/such/partial.html"}))
        .build_and_render()?;

    println!("{}", result.html);
    println!(
        "rendered in {:?} with {} queries and {} diagnostics",
        result.duration,
        result.queries,
        result.diagnostics.len()
    );
    Ok(())
}
