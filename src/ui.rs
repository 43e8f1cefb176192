/// Generic failure screen with a full reload action. Shown when a page load
/// has neither network nor cached shell, and when a handler panics.
pub fn render_failure_page(message: &str) -> String {
    FAILURE_HTML.replace("{{MESSAGE}}", &escape_html(message))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const FAILURE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Aura</title>
  <style>
    :root {
      --bg: #050505;
      --ink: #f5f5f5;
      --muted: rgba(245, 245, 245, 0.45);
      --accent: #9c38ff;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      display: grid;
      place-items: center;
      padding: 32px;
      background: var(--bg);
      color: var(--ink);
      font-family: "Plus Jakarta Sans", "Trebuchet MS", sans-serif;
      text-align: center;
    }

    h1 {
      font-size: 1.6rem;
      margin: 0 0 8px;
    }

    p {
      color: var(--muted);
      max-width: 22rem;
      margin: 0 auto 24px;
      font-size: 0.9rem;
    }

    button {
      border: none;
      border-radius: 18px;
      padding: 12px 24px;
      font-weight: 700;
      background: var(--ink);
      color: var(--bg);
      cursor: pointer;
    }

    button:active {
      transform: scale(0.95);
    }
  </style>
</head>
<body>
  <main>
    <h1>Something went wrong.</h1>
    <p>{{MESSAGE}}</p>
    <button type="button" onclick="window.location.reload()">Reload App</button>
  </main>
</body>
</html>
"#;
