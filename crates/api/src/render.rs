//! HTML rendering seam for job results.
//!
//! Template rendering lives outside this service; [`ResultRenderer`] is the
//! boundary. [`PlainHtmlRenderer`] is the built-in fallback: the result as
//! pretty JSON inside a minimal page.

use serde_json::Value;

pub trait ResultRenderer: Send + Sync {
    /// Render a JSON job result as an HTML document.
    fn render_job_result(&self, job_id: &str, result: &Value) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHtmlRenderer;

impl ResultRenderer for PlainHtmlRenderer {
    fn render_job_result(&self, job_id: &str, result: &Value) -> String {
        let pretty = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
        let job_id = escape_html(job_id);
        format!(
            "<!DOCTYPE html>\n<html>\n<head><title>Job {job_id} results</title></head>\n\
             <body>\n<h1>Job {job_id} results</h1>\n<pre>{}</pre>\n</body>\n</html>\n",
            escape_html(&pretty)
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
