//! Text framing and escaping for embedded blocks.
//!
//! Embedded text lives inside `<script>` elements framed so the block
//! is inert in both XML and HTML parsing: a CDATA open, a comment
//! open, the payload, then a comment close and CDATA close. Nothing in
//! the payload may terminate the frame early, so payloads are escaped
//! before framing.

/// Opening frame: CDATA open (XML) doubling as `><!--` (HTML).
pub const ESCAPE_START: &str = "<![CDATA[><!--";

/// Closing frame: `:--><!` (HTML) doubling as CDATA close (XML).
pub const ESCAPE_END: &str = ":--><!]]>";

/// Recover the payload of a framed block.
///
/// Accepts both the full XHTML framing and the bare HTML one (missing
/// CDATA markers), mirroring what a forgiving HTML parser leaves
/// behind. Returns `None` when the framing is damaged.
pub fn comment_cdata_extract(text: &str) -> Option<String> {
    let t = text.trim();
    let t = t.strip_prefix("<![CDATA[").unwrap_or(t);
    let t = t.strip_prefix("><!--")?;
    let t = t.strip_suffix("]]>").unwrap_or(t);
    let t = t.strip_suffix(":--><!")?;
    Some(t.trim().to_string())
}

/// Escape text content for element bodies.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for double-quoted attribute values.
pub fn xml_escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape JSON text for embedding inside a framed script block.
///
/// JSON is not HTML-aware, so a `</script>` or comment-close sequence
/// inside a string literal would terminate the surrounding frame. The
/// offending characters are re-expressed as JSON unicode escapes,
/// which leaves the decoded value unchanged.
pub fn json_script_escape(json: &str) -> String {
    json.replace('<', "\\u003c").replace('>', "\\u003e").replace('-', "\\u002d")
}
