//! Viewer page served at `/`.
//!
//! The "live" stream is produced entirely in the browser: a script swaps the
//! image source to `/jpg?t=<now>` on a fixed interval, the timestamp keeping
//! caches from answering. The server stays stateless across requests.

/// Render the viewer page for the given refresh interval.
pub fn viewer_page(refresh_interval_ms: u64) -> String {
    format!(
        "<!DOCTYPE html>\
<html><head>\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>jpegcam</title>\
<style>body{{margin:0;padding:0;background:#000;}}</style>\
<script>\
function refresh() {{\
 document.getElementById('stream').src = '/jpg?t=' + Date.now();\
 setTimeout(refresh, {interval});\
}}\
</script>\
</head><body onload='refresh()'>\
<img id='stream' alt='camera' style='display:block;width:100%;height:auto;'>\
</body></html>",
        interval = refresh_interval_ms
    )
}
