//! Script injected into every page before its own scripts run. It exposes
//! `window.FlowBridge.invoke(messageType, payload)` on top of the
//! surface's `postMessage` channel.

pub const BRIDGE_GLOBAL: &str = "FlowBridge";
pub const EVENT_PREFIX: &str = "flowbridge";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BridgeVariant {
    /// `invoke` posts the envelope and returns nothing.
    FireAndForget,
    /// `invoke` returns a promise settled by the correlated response.
    #[default]
    Promise,
}

pub fn bootstrap_script(variant: BridgeVariant) -> String {
    match variant {
        BridgeVariant::FireAndForget => FIRE_AND_FORGET
            .replace("__GLOBAL__", BRIDGE_GLOBAL)
            .replace("__PREFIX__", EVENT_PREFIX),
        BridgeVariant::Promise => PROMISE
            .replace("__GLOBAL__", BRIDGE_GLOBAL)
            .replace("__PREFIX__", EVENT_PREFIX),
    }
}

const FIRE_AND_FORGET: &str = r#"(function () {
  if (window.__GLOBAL__) { return; }
  var post = function (envelope) {
    window.chrome.webview.postMessage(JSON.stringify(envelope));
  };
  window.__GLOBAL__ = {
    invoke: function (messageType, payload) {
      post({ messageType: messageType, payload: payload || {} });
    }
  };
  window.chrome.webview.addEventListener('message', function (e) {
    var msg = typeof e.data === 'string' ? JSON.parse(e.data) : e.data;
    if (msg && msg.event) {
      window.dispatchEvent(new CustomEvent('__PREFIX__:' + msg.event, { detail: msg.data }));
    }
  });
})();"#;

const PROMISE: &str = r#"(function () {
  if (window.__GLOBAL__) { return; }
  var callbacks = {};
  var nextId = 0;
  var post = function (envelope) {
    window.chrome.webview.postMessage(JSON.stringify(envelope));
  };
  window.__GLOBAL__ = {
    invoke: function (messageType, payload) {
      var callbackId = 'cb_' + Date.now() + '_' + (nextId++);
      return new Promise(function (resolve, reject) {
        callbacks[callbackId] = { resolve: resolve, reject: reject };
        post({ callbackId: callbackId, messageType: messageType, payload: payload || {} });
      });
    },
    log: function (level, message) {
      post({ messageType: 'log', payload: { level: level, message: String(message) } });
    }
  };
  window.chrome.webview.addEventListener('message', function (e) {
    var msg = typeof e.data === 'string' ? JSON.parse(e.data) : e.data;
    if (!msg) { return; }
    if (msg.event) {
      window.dispatchEvent(new CustomEvent('__PREFIX__:' + msg.event, { detail: msg.data }));
      return;
    }
    var pending = callbacks[msg.callbackId];
    if (!pending) { return; }
    delete callbacks[msg.callbackId];
    if (msg.success) {
      pending.resolve(msg.data);
    } else {
      pending.reject(new Error(msg.error || 'bridge request failed'));
    }
  });
})();"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promise_variant_tracks_callbacks() {
        let script = bootstrap_script(BridgeVariant::Promise);
        assert!(script.contains("window.FlowBridge = {"));
        assert!(script.contains("callbacks[callbackId] = { resolve: resolve, reject: reject }"));
        assert!(script.contains("'flowbridge:' + msg.event"));
        assert!(!script.contains("__GLOBAL__"));
        assert!(!script.contains("__PREFIX__"));
    }

    #[test]
    fn fire_and_forget_variant_sends_no_callback_id() {
        let script = bootstrap_script(BridgeVariant::FireAndForget);
        assert!(script.contains("window.chrome.webview.postMessage"));
        assert!(!script.contains("callbackId"));
        assert!(!script.contains("__GLOBAL__"));
    }
}
