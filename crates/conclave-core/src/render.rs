//! Speaker-aware terminal rendering
//!
//! Agents may open a line with `[name]:` (or `[@name]`) to voice another
//! perspective; the renderer re-colors those segments as the tokens arrive.
//! A tag can land split across stream fragments, so a small lookahead
//! buffer holds a suspected tag until it either completes or stops looking
//! tag-shaped.
//!
//! Coloring is a rendering side effect only: the accumulated message
//! returned by [`SpeakerRenderer::finish`] is the raw concatenation of
//! every token fed in.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::OnceLock;

use colored::{Color, Colorize};
use regex::Regex;

/// Color reserved for the user's `[User]:` segments
pub const USER_COLOR: Color = Color::Blue;

/// Fixed palette assigned to agents in first-seen order, cycling on overflow
pub const AGENT_PALETTE: &[Color] = &[
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::Red,
    Color::TrueColor { r: 255, g: 165, b: 0 },   // orange
    Color::TrueColor { r: 147, g: 112, b: 219 }, // purple
    Color::TrueColor { r: 0, g: 255, b: 255 },   // aqua
    Color::TrueColor { r: 255, g: 105, b: 180 }, // hot pink
];

/// A suspected tag longer than this is treated as ordinary text
const MAX_TAG_LOOKAHEAD: usize = 30;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[@?([^\]]+)\]:?\s*").expect("valid tag regex"))
}

fn partial_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[@?[^\]]*$").expect("valid partial tag regex"))
}

/// Stable name-to-color assignment for the lifetime of the process.
///
/// Constructed once and passed by reference wherever agent names are
/// printed, so the same name always renders in the same color.
#[derive(Debug, Default)]
pub struct ColorAssigner {
    assigned: HashMap<String, Color>,
}

impl ColorAssigner {
    /// Create an empty assigner
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Color for a name, assigning the next palette entry on first sight
    pub fn color_for(&mut self, name: &str) -> Color {
        let key = name.to_lowercase();
        if key == "user" {
            return USER_COLOR;
        }

        if let Some(color) = self.assigned.get(&key) {
            return *color;
        }
        let color = AGENT_PALETTE[self.assigned.len() % AGENT_PALETTE.len()];
        self.assigned.insert(key, color);
        color
    }
}

/// Streaming renderer for one agent's live response
pub struct SpeakerRenderer<'a, W: Write> {
    out: &'a mut W,
    colors: &'a mut ColorAssigner,
    known_names: HashSet<String>,
    current: Color,
    at_line_start: bool,
    buffer: String,
    accumulated: String,
}

impl<'a, W: Write> SpeakerRenderer<'a, W> {
    /// Renderer starting in the default agent's color.
    ///
    /// `participants` are the names whose tags switch the active color;
    /// the literal `user` is always recognized.
    pub fn new(
        out: &'a mut W,
        colors: &'a mut ColorAssigner,
        default_agent: &str,
        participants: &[String],
    ) -> Self {
        let mut known_names: HashSet<String> =
            participants.iter().map(|n| n.to_lowercase()).collect();
        known_names.insert("user".to_string());

        let current = colors.color_for(default_agent);
        Self {
            out,
            colors,
            known_names,
            current,
            at_line_start: true,
            buffer: String::new(),
            accumulated: String::new(),
        }
    }

    /// Feed one stream fragment, emitting whatever can be decided now
    pub fn feed(&mut self, token: &str) -> std::io::Result<()> {
        self.accumulated.push_str(token);
        self.buffer.push_str(token);
        self.drain_buffer()
    }

    /// Flush any residual buffered text and return the accumulated message
    pub fn finish(mut self) -> std::io::Result<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.emit(&rest)?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(self.accumulated)
    }

    fn drain_buffer(&mut self) -> std::io::Result<()> {
        while !self.buffer.is_empty() {
            if self.at_line_start && self.buffer.starts_with('[') {
                if let Some(caps) = tag_regex().captures(&self.buffer) {
                    let full = caps.get(0).expect("whole match").as_str().to_string();
                    let name = caps[1].trim_start_matches('@').to_string();

                    if self.known_names.contains(&name.to_lowercase()) {
                        self.current = self.colors.color_for(&name);
                    }

                    self.emit(&full)?;
                    self.buffer.drain(..full.len());
                    self.at_line_start = false;
                    continue;
                }

                if partial_tag_regex().is_match(&self.buffer)
                    && self.buffer.len() < MAX_TAG_LOOKAHEAD
                {
                    // Still looks like the start of a tag; wait for more tokens
                    break;
                }

                // Not a tag after all: the '[' is ordinary text
                self.emit("[")?;
                self.buffer.drain(..1);
                self.at_line_start = false;
                continue;
            }

            if self.buffer.starts_with('\n') {
                writeln!(self.out)?;
                self.buffer.drain(..1);
                self.at_line_start = true;
                continue;
            }

            // Emit the run up to the next newline in the current color
            let run_end = self.buffer.find('\n').unwrap_or(self.buffer.len());
            let run: String = self.buffer.drain(..run_end).collect();
            self.emit(&run)?;
            self.at_line_start = false;
        }
        self.out.flush()
    }

    fn emit(&mut self, text: &str) -> std::io::Result<()> {
        write!(self.out, "{}", text.color(self.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(tokens: &[&str], participants: &[&str]) -> String {
        let mut out = Vec::new();
        let mut colors = ColorAssigner::new();
        let participants: Vec<String> = participants.iter().map(|s| s.to_string()).collect();
        let mut renderer = SpeakerRenderer::new(&mut out, &mut colors, "ceo", &participants);
        for token in tokens {
            renderer.feed(token).unwrap();
        }
        renderer.finish().unwrap()
    }

    #[test]
    fn test_stable_color_per_name() {
        let mut colors = ColorAssigner::new();
        let first = colors.color_for("ceo");
        let second = colors.color_for("cto");
        assert_ne!(first, second);
        assert_eq!(colors.color_for("CEO"), first);
        assert_eq!(colors.color_for("cto"), second);
    }

    #[test]
    fn test_palette_cycles_on_overflow() {
        let mut colors = ColorAssigner::new();
        let first = colors.color_for("agent-0");
        for i in 1..AGENT_PALETTE.len() {
            colors.color_for(&format!("agent-{i}"));
        }
        // One past the palette wraps back to the first entry
        let wrapped = colors.color_for("agent-overflow");
        assert_eq!(wrapped, first);
    }

    #[test]
    fn test_user_is_always_blue() {
        let mut colors = ColorAssigner::new();
        assert_eq!(colors.color_for("user"), USER_COLOR);
        assert_eq!(colors.color_for("User"), USER_COLOR);
    }

    #[test]
    fn test_accumulated_equals_raw_concatenation() {
        let tokens = ["[ct", "o]: on", "e\ntwo [not a tag\n", "@ceo done"];
        let message = render(&tokens, &["ceo", "cto"]);
        assert_eq!(message, tokens.concat());
    }

    #[test]
    fn test_tag_split_across_fragments() {
        // The tag arrives in three fragments; output must stay intact
        let message = render(&["[", "cto", "]: hello"], &["ceo", "cto"]);
        assert_eq!(message, "[cto]: hello");
    }

    #[test]
    fn test_unknown_tag_is_plain_text() {
        let message = render(&["[nobody]: hi"], &["ceo", "cto"]);
        assert_eq!(message, "[nobody]: hi");
    }

    #[test]
    fn test_long_bracket_run_not_held_forever() {
        // Looks tag-shaped but exceeds the lookahead: emitted as plain text
        let long = "[aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let message = render(&[long], &["ceo"]);
        assert_eq!(message, long);
    }

    #[test]
    fn test_mid_line_bracket_not_a_tag() {
        let message = render(&["see [cto]: inline"], &["ceo", "cto"]);
        assert_eq!(message, "see [cto]: inline");
    }
}
