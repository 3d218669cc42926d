use std::io::{self, Write};

use lens_match::{SpriteEntry, SpriteMatch};
use lens_meta::MetadataRecord;
use tracing::warn;

/// Receives everything the detection loop wants shown
pub trait DisplaySink {
    /// A sprite was identified this cycle
    fn show_match(&mut self, sprite: &SpriteEntry, hit: &SpriteMatch);
    /// Nothing was identified this cycle
    fn show_no_detection(&mut self);
    fn show_record(&mut self, name: &str, record: &MetadataRecord);
    /// Metadata for a detected item could not be obtained
    fn show_not_found(&mut self, name: &str);
    fn show_paused(&mut self, _paused: bool) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shown {
    Nothing,
    Item(String),
}

/// Plain-text sink; repeats of the same state are not printed again
pub struct TerminalSink<W: Write> {
    out: W,
    shown: Option<Shown>,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, shown: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(err) = writeln!(self.out, "{text}").and_then(|_| self.out.flush()) {
            warn!(error = %err, "cannot write to display");
        }
    }
}

/// Full text block for one record
pub fn render_record(record: &MetadataRecord) -> String {
    format!(
        "{title}\n{stars}\n{id}\n{quote}\n\nEffects\n{effects}\n\nSynergies\n{synergies}",
        title = record.display_title(),
        stars = record.quality.stars(),
        id = record.display_entity_id(),
        quote = record.display_quote(),
        effects = record.display_effects(),
        synergies = record.display_synergies(),
    )
}

impl<W: Write> DisplaySink for TerminalSink<W> {
    fn show_match(&mut self, sprite: &SpriteEntry, hit: &SpriteMatch) {
        let state = Shown::Item(hit.name.clone());
        if self.shown.as_ref() == Some(&state) {
            return;
        }
        self.shown = Some(state);
        let (w, h) = sprite.image.dimensions();
        self.emit(&format!(
            "== {} ({}x{} sprite, score {:.2}, {} matches)",
            hit.name, w, h, hit.score, hit.good_matches
        ));
    }

    fn show_no_detection(&mut self) {
        if self.shown == Some(Shown::Nothing) {
            return;
        }
        self.shown = Some(Shown::Nothing);
        self.emit("No item detected");
    }

    fn show_record(&mut self, _name: &str, record: &MetadataRecord) {
        self.emit(&render_record(record));
    }

    fn show_not_found(&mut self, name: &str) {
        self.emit(&format!("{name}: no metadata\n{}", render_record(&MetadataRecord::new(""))));
    }

    fn show_paused(&mut self, paused: bool) {
        self.emit(if paused { "-- paused --" } else { "-- resumed --" });
    }
}
