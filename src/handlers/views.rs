use askama::Template;
use axum::{
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use validator::ValidationErrors;

use crate::error::escape_html;
use crate::flows::code_input::{CodeInput, CODE_LEN};

/// One rendered input cell of a six-digit code row.
pub struct CellView {
    pub index: usize,
    pub value: String,
    pub focused: bool,
}

pub fn cell_views(input: &CodeInput) -> Vec<CellView> {
    (0..CODE_LEN)
        .map(|index| CellView {
            index,
            value: input
                .cell(index)
                .map(|digit| digit.to_string())
                .unwrap_or_default(),
            focused: index == input.focus(),
        })
        .collect()
}

/// The shared six-cell input row. `base` is the URL prefix of the owning
/// flow's input endpoints, `target` the HTMX swap target of the panel.
#[derive(Template)]
#[template(path = "code_cells.html")]
pub struct CodeCellsTemplate {
    pub base: &'static str,
    pub target: &'static str,
    pub cells: Vec<CellView>,
}

/// HTMX client-side redirect (teacher-style navigation after a post).
pub fn hx_redirect(location: &str) -> Response {
    let mut headers = HeaderMap::new();
    match location.parse() {
        Ok(value) => {
            headers.insert("HX-Redirect", value);
            (StatusCode::OK, headers, "").into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Inline error fragment for form posts.
pub fn error_fragment(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Html(format!(
            "<p class='text-red-500 text-sm'>{}</p>",
            escape_html(message)
        )),
    )
        .into_response()
}

pub fn first_validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errors| errors.iter())
        .filter_map(|error| error.message.as_ref())
        .next()
        .map(|message| message.to_string())
        .unwrap_or_else(|| "Check the highlighted fields".to_string())
}

/// Label stored alongside a trusted device, derived from the browser's
/// user agent.
pub fn device_label(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|ua| ua.chars().take(64).collect::<String>())
        .filter(|ua| !ua.is_empty())
        .unwrap_or_else(|| "Browser".to_string())
}

/// A safe internal redirect target: same-origin absolute paths only.
pub fn sanitize_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//"))
}
