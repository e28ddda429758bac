//! HTML rendering for quote documents.
//!
//! Quotes render through a Tera template to printable HTML; browsers handle
//! the print-to-PDF step. Totals and per-line prices are passed in already
//! recomputed, the template never does arithmetic.

use std::collections::HashMap;

use tera::{Context, Tera};

use dealdesk_core::domain::quote::Quote;
use dealdesk_core::pricing::QuoteTotals;

/// Register custom Tera filters used by quote templates.
///
/// - `money`:  2-decimal money rendering, e.g. `totals.grand_total | money`
/// - `format`: printf-style formatting, e.g. `"%.1f" | format(value=pct)`
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
    tera.register_filter("format", tera_format_filter);
}

/// Implements printf-style `%.Nf` formatting for Tera.
fn tera_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let format_str = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("format filter expects a string input"))?;
    let arg = args
        .get("value")
        .ok_or_else(|| tera::Error::msg("format filter requires a 'value' argument"))?;

    let num = match arg {
        tera::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        tera::Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    let result = match format_str.strip_prefix("%.").and_then(|rest| rest.strip_suffix('f')) {
        Some(precision_str) => {
            let precision: usize = precision_str.parse().unwrap_or(2);
            format!("{num:.precision$}")
        }
        None => format!("{num}"),
    };

    Ok(tera::Value::String(result))
}

/// Money values arrive either as JSON numbers or as decimal strings (the
/// serde form of `Decimal`); both render with two decimal places.
fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let num = match value {
        tera::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        tera::Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(tera::Value::String(format!("{num:.2}")))
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(String),
}

#[derive(Clone, Debug)]
pub struct DocumentRenderer {
    tera: Tera,
    company_name: String,
}

impl DocumentRenderer {
    /// Load templates from a directory on disk.
    pub fn new(template_dir: &str, company_name: &str) -> Result<Self, RenderError> {
        let mut tera = Tera::new(&format!("{template_dir}/**/*"))
            .map_err(|e| RenderError::Template(e.to_string()))?;
        register_template_filters(&mut tera);
        Ok(Self { tera, company_name: company_name.to_string() })
    }

    /// Renderer backed by the template compiled into the binary. Used when
    /// no template directory is deployed alongside the server, and in tests.
    pub fn with_embedded_templates(company_name: &str) -> Self {
        let mut tera = Tera::default();
        register_template_filters(&mut tera);
        tera.add_raw_template(
            "quote.html.tera",
            include_str!("../../../templates/quotes/quote.html.tera"),
        )
        .expect("embedded quote.html.tera must parse");
        Self { tera, company_name: company_name.to_string() }
    }

    pub fn render_quote(
        &self,
        quote: &Quote,
        totals: &QuoteTotals,
    ) -> Result<String, RenderError> {
        let lines: Vec<serde_json::Value> = quote
            .items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "sl_no": item.sl_no,
                    "product": item.product,
                    "description": item.description,
                    "quantity": item.quantity.to_string(),
                    "unit_price": item.unit_price().round_dp(2).to_string(),
                    "total_price": item.total_price().round_dp(2).to_string(),
                    "vat_percent": item.vat_percent.to_string(),
                })
            })
            .collect();

        let mut context = Context::new();
        context.insert("company_name", &self.company_name);
        context.insert("quote", quote);
        context.insert("lines", &lines);
        context.insert("totals", &totals.rounded());

        self.tera
            .render("quote.html.tera", &context)
            .map_err(|e| RenderError::Template(e.to_string()))
    }
}
