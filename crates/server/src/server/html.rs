//! The terminal entry page served by both content routes.

/// Render the terminal page for a normalised base path and page title.
///
/// Asset URLs point under `{base}/client`.
pub fn render(base: &str, title: &str) -> String {
    let title = escape(title);
    format!(
        r##"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <link rel="icon" type="image/x-icon" href="{base}/favicon.ico">
    <link rel="stylesheet" href="{base}/client/wetty.css">
  </head>
  <body>
    <div id="overlay">
      <div class="error">
        <div id="msg"></div>
        <input type="button" onclick="location.reload();" value="reconnect">
      </div>
    </div>
    <div id="options">
      <a class="toggler" href="#" alt="Toggle options"></a>
      <iframe class="editor" src="{base}/client/xterm_config/index.html"></iframe>
    </div>
    <div id="terminal"></div>
    <script type="module" src="{base}/client/wetty.js"></script>
  </body>
</html>
"##
    )
}

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
