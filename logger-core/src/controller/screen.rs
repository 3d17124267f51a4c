use heapless::String;

use crate::capabilities::Display;

/// Characters per display row.
pub const DISPLAY_COLUMNS: usize = 16;

/// One display row.
pub type ScreenLine = String<DISPLAY_COLUMNS>;

/// Remembers the frame on the display so unchanged frames are not re-sent.
#[derive(Clone, Debug, Default)]
pub(crate) struct ScreenCache {
    rows: Option<[ScreenLine; 2]>,
}

impl ScreenCache {
    pub(crate) const fn new() -> Self {
        Self { rows: None }
    }

    /// Writes both rows unless the display already shows them.
    pub(crate) fn show<D: Display>(&mut self, display: &mut D, top: &str, bottom: &str) -> bool {
        let frame = [fit(top), fit(bottom)];
        if self.rows.as_ref() == Some(&frame) {
            return false;
        }

        display.clear();
        for (row, text) in (0u8..).zip(frame.iter()) {
            display.set_cursor(0, row);
            display.write_text(text);
        }
        self.rows = Some(frame);
        true
    }

    pub(crate) fn rows(&self) -> Option<&[ScreenLine; 2]> {
        self.rows.as_ref()
    }
}

/// Truncates `text` to one display row.
pub(crate) fn fit(text: &str) -> ScreenLine {
    let mut line = ScreenLine::new();
    for ch in text.chars() {
        if line.push(ch).is_err() {
            break;
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingDisplay {
        writes: usize,
    }

    impl Display for CountingDisplay {
        fn clear(&mut self) {}

        fn set_cursor(&mut self, _: u8, _: u8) {}

        fn write_text(&mut self, _: &str) {
            self.writes += 1;
        }

        fn backlight_on(&mut self) {}

        fn backlight_off(&mut self) {}
    }

    #[test]
    fn identical_frames_are_written_once() {
        let mut cache = ScreenCache::new();
        let mut display = CountingDisplay::default();

        assert!(cache.show(&mut display, "T: 21.00 C", "H: 40.00 %RH"));
        assert!(!cache.show(&mut display, "T: 21.00 C", "H: 40.00 %RH"));
        assert!(cache.show(&mut display, "T: 21.50 C", "H: 40.00 %RH"));
        assert_eq!(display.writes, 4);
    }

    #[test]
    fn long_text_is_cut_at_the_row_width() {
        assert_eq!(fit("0123456789abcdefXYZ").as_str(), "0123456789abcdef");
    }
}
