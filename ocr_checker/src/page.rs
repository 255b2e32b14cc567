//! Server-rendered checker page.

use crate::error::CheckerError;
use base64::{engine::general_purpose::STANDARD, Engine};
use ocr_inference::Prediction;

const TITLE: &str = "OCR Model Checker";

/// Uploaded image embedded back into the page as a data URI.
#[derive(Debug, Clone)]
pub struct Preview {
    mime: &'static str,
    encoded: String,
}

impl Preview {
    /// Fails when the bytes are not in a format the decoder recognizes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let format = image::guess_format(bytes)?;
        Ok(Self {
            mime: format.to_mime_type(),
            encoded: STANDARD.encode(bytes),
        })
    }

    fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.encoded)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Empty,
    Predicted {
        preview: Preview,
        prediction: Prediction,
    },
    Failed {
        preview: Option<Preview>,
        error: CheckerError,
    },
}

pub fn render(outcome: &Outcome, allowed_extensions: &[String]) -> String {
    let accept = allowed_extensions
        .iter()
        .map(|extension| format!(".{}", extension))
        .collect::<Vec<_>>()
        .join(",");

    let mut body = format!(
        r#"<h1>{title}</h1>
<p>Upload an image to see the OCR model's prediction.</p>
<form method="post" action="/" enctype="multipart/form-data">
<label for="file">Choose an image...</label>
<input id="file" type="file" name="file" accept="{accept}" onchange="this.form.submit()">
<noscript><button type="submit">Check</button></noscript>
</form>
"#,
        title = TITLE,
        accept = escape_html(&accept),
    );

    match outcome {
        Outcome::Empty => {}
        Outcome::Predicted {
            preview,
            prediction,
        } => {
            body.push_str(&render_preview(preview));
            body.push_str(&format!(
                "<p>Model Prediction:</p>\n<pre class=\"prediction\">{}</pre>\n",
                escape_html(&prediction.to_string())
            ));
        }
        Outcome::Failed { preview, error } => {
            if let Some(preview) = preview {
                body.push_str(&render_preview(preview));
            }
            body.push_str(&format!(
                "<p class=\"error\">{}</p>\n",
                escape_html(&error.to_string())
            ));
        }
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        TITLE, body
    )
}

fn render_preview(preview: &Preview) -> String {
    format!(
        "<figure>\n<img src=\"{}\" alt=\"Uploaded Image\" style=\"width:100%\">\n<figcaption>Uploaded Image</figcaption>\n</figure>\n",
        preview.data_uri()
    )
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
