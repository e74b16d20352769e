//! Embedded landing page.
//!
//! Plain HTTP requests on the chat port get a small HTML client that
//! connects back over WebSocket on the same host and port.
//!
//! | Route | Asset |
//! |-------|-------|
//! | `/`, `/index.html` | Chat page |
//! | `/app.js` | Chat client script |

// ============================================================================
// Asset
// ============================================================================

/// A static response body and its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    /// `Content-Type` header value.
    pub content_type: &'static str,
    /// Response body.
    pub body: &'static str,
}

/// Looks up the asset served at `route`.
#[must_use]
pub fn lookup(route: &str) -> Option<Asset> {
    let (content_type, body) = match route {
        "/" | "/index.html" => ("text/html; charset=utf-8", INDEX_HTML),
        "/app.js" => ("application/javascript; charset=utf-8", APP_JS),
        _ => return None,
    };

    Some(Asset { content_type, body })
}

// ============================================================================
// Constants
// ============================================================================

/// Chat page.
const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Chat</title>
  <style>
    body { font-family: sans-serif; margin: 2em; }
    #chat-app { display: none; }
    #status.connecting { color: #a60; }
    #status.connected { color: #080; }
    #status.closed { color: #a00; }
    td { padding: 0 0.5em; vertical-align: top; }
  </style>
</head>
<body>
  <form id="start-chat-form">
    <input id="username" placeholder="Username" maxlength="32" required>
    <button type="submit">Join</button>
  </form>
  <p id="status"></p>
  <div id="chat-app">
    <table><tbody id="chats"></tbody></table>
    <form id="chat-form">
      <input id="enter-chat" placeholder="Say something" autocomplete="off">
      <button type="submit">Send</button>
    </form>
  </div>
  <script src="/app.js"></script>
</body>
</html>
"#;

/// Chat client script.
const APP_JS: &str = r#"(function () {
  "use strict";

  var socket = null;

  function send(data) {
    if (socket && socket.readyState === WebSocket.OPEN) {
      socket.send(JSON.stringify(data));
    }
  }

  function appendRow(chats, cells) {
    var tr = document.createElement("tr");
    cells.forEach(function (text) {
      var td = document.createElement("td");
      td.textContent = text;
      tr.appendChild(td);
    });
    chats.appendChild(tr);
  }

  function start(e) {
    e.preventDefault();
    var username = document.getElementById("username").value;
    var status = document.getElementById("status");
    var chats = document.getElementById("chats");

    document.getElementById("start-chat-form").style.display = "none";
    status.textContent = "Connecting...";
    status.className = "connecting";

    socket = new WebSocket("ws://" + location.host + "/");

    socket.onopen = function () {
      status.textContent = "Connected";
      status.className = "connected";
      document.getElementById("chat-app").style.display = "block";
      send({ type: "new_user", username: username });
    };

    socket.onclose = function () {
      status.textContent = "Disconnected";
      status.className = "closed";
    };

    socket.onmessage = function (event) {
      var data = JSON.parse(event.data);
      var who = data.type === "notice" ? "*Server Message*"
              : data.type === "error" ? "*Error*"
              : data.username;
      appendRow(chats, ["[" + (data.datetime || "") + "]", who, data.message]);
    };

    document.getElementById("chat-form").addEventListener("submit", function (e) {
      e.preventDefault();
      var input = document.getElementById("enter-chat");
      send({ type: "user_message", message: input.value });
      input.value = "";
    });
  }

  window.addEventListener("load", function () {
    document.getElementById("start-chat-form").addEventListener("submit", start);
  });
})();
"#;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_routes() {
        let root = lookup("/").expect("index");
        assert_eq!(lookup("/index.html"), Some(root));
        assert!(root.content_type.starts_with("text/html"));
        assert!(root.body.contains("/app.js"));
    }

    #[test]
    fn test_script_route() {
        let script = lookup("/app.js").expect("script");
        assert!(script.content_type.starts_with("application/javascript"));
        assert!(script.body.contains("new_user"));
        assert!(script.body.contains("user_message"));
    }

    #[test]
    fn test_unknown_route() {
        assert!(lookup("/etc/passwd").is_none());
        assert!(lookup("/../Cargo.toml").is_none());
    }
}
