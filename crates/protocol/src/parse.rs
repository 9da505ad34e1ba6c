use penplot_geom::Rotation;

use crate::{Cmd, Target};

/// A short piece of the offending input, for error messages. Longer words get
/// truncated.
pub type Word = heapless::String<16>;

fn word(s: &str) -> Word {
    let mut w = Word::new();
    for c in s.chars() {
        if w.push(c).is_err() {
            break;
        }
    }
    w
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command `{0}`")]
    UnknownCommand(Word),
    #[error("malformed parameter `{0}`")]
    MalformedParameter(Word),
    #[error("{opcode} needs a {letter} parameter")]
    MissingParameter { opcode: &'static str, letter: char },
    #[error("parameter {0} given more than once")]
    DuplicateParameter(char),
    #[error("unterminated comment")]
    UnterminatedComment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Opcode {
    Rapid,
    Linear,
    Arc(Rotation),
    Dwell,
    PenDown,
    PenUp,
}

impl Opcode {
    // Opcodes are compared by number, so "G01" and "G1" are the same thing.
    fn parse(w: &str) -> Option<Opcode> {
        let mut chars = w.chars();
        let letter = chars.next()?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let op = match (letter, digits.parse::<u32>().ok()?) {
            ('G', 0) => Opcode::Rapid,
            ('G', 1) => Opcode::Linear,
            ('G', 2) => Opcode::Arc(Rotation::Clockwise),
            ('G', 3) => Opcode::Arc(Rotation::CounterClockwise),
            ('G', 4) => Opcode::Dwell,
            ('M', 3) => Opcode::PenDown,
            ('M', 5) => Opcode::PenUp,
            _ => return None,
        };
        Some(op)
    }

    fn name(&self) -> &'static str {
        match self {
            Opcode::Rapid => "G0",
            Opcode::Linear => "G1",
            Opcode::Arc(Rotation::Clockwise) => "G2",
            Opcode::Arc(Rotation::CounterClockwise) => "G3",
            Opcode::Dwell => "G4",
            Opcode::PenDown => "M03",
            Opcode::PenUp => "M05",
        }
    }
}

/// Splits a line into whitespace-separated words, skipping `( ... )` comments
/// and stopping at a `;` comment.
struct Words<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Words<'a> {
    type Item = Result<&'a str, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.rest = self.rest.trim_start();
            if self.rest.is_empty() || self.rest.starts_with(';') {
                return None;
            }
            if let Some(comment) = self.rest.strip_prefix('(') {
                let Some(end) = comment.find(')') else {
                    self.rest = "";
                    return Some(Err(ParseError::UnterminatedComment));
                };
                self.rest = &comment[end + 1..];
                continue;
            }

            let end = self
                .rest
                .find(|c: char| c.is_whitespace() || c == '(' || c == ';')
                .unwrap_or(self.rest.len());
            let (w, rest) = self.rest.split_at(end);
            self.rest = rest;
            return Some(Ok(w));
        }
    }
}

/// Parameter words indexed by letter. Every word in here has already been
/// checked to hold a finite number.
#[derive(Default)]
struct Params<'a> {
    words: [Option<&'a str>; 26],
}

impl<'a> Params<'a> {
    fn insert(&mut self, w: &'a str) -> Result<(), ParseError> {
        let malformed = || ParseError::MalformedParameter(word(w));
        let letter = w.chars().next().ok_or_else(malformed)?;
        if !letter.is_ascii_uppercase() {
            return Err(malformed());
        }
        match w[1..].parse::<f32>() {
            Ok(v) if v.is_finite() => {}
            _ => return Err(malformed()),
        }

        let slot = &mut self.words[usize::from(letter as u8 - b'A')];
        if slot.is_some() {
            return Err(ParseError::DuplicateParameter(letter));
        }
        *slot = Some(w);
        Ok(())
    }

    fn word(&self, letter: char) -> Option<&'a str> {
        self.words[usize::from(letter as u8 - b'A')]
    }

    fn get(&self, letter: char) -> Option<f32> {
        self.word(letter).and_then(|w| w[1..].parse().ok())
    }

    fn require(&self, op: Opcode, letter: char) -> Result<f32, ParseError> {
        self.get(letter).ok_or(ParseError::MissingParameter {
            opcode: op.name(),
            letter,
        })
    }

    fn target(&self) -> Target {
        Target {
            x: self.get('X'),
            y: self.get('Y'),
        }
    }
}

/// Parses a single line of G-code.
///
/// Blank lines and lines holding only a comment parse to `None`. Either the
/// whole line parses or none of it does: every parameter is checked before a
/// command is returned.
pub fn parse_line(line: &str) -> Result<Option<Cmd>, ParseError> {
    let mut words = Words { rest: line };
    let Some(op_word) = words.next().transpose()? else {
        return Ok(None);
    };
    let op = Opcode::parse(op_word).ok_or_else(|| ParseError::UnknownCommand(word(op_word)))?;

    let mut params = Params::default();
    for w in words {
        params.insert(w?)?;
    }

    let cmd = match op {
        Opcode::Rapid => Cmd::Rapid(params.target()),
        Opcode::Linear => Cmd::Linear(params.target()),
        Opcode::Arc(rotation) => Cmd::Arc {
            target: params.target(),
            radius: params.require(op, 'R')?,
            angle_deg: params.require(op, 'A')?,
            rotation,
        },
        Opcode::Dwell => {
            let p = params.word('P').ok_or(ParseError::MissingParameter {
                opcode: op.name(),
                letter: 'P',
            })?;
            let ms = p[1..]
                .parse::<u32>()
                .map_err(|_| ParseError::MalformedParameter(word(p)))?;
            Cmd::Dwell { ms }
        }
        Opcode::PenDown => Cmd::PenDown,
        Opcode::PenUp => Cmd::PenUp,
    };
    Ok(Some(cmd))
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(s: &str) -> Cmd {
        parse_line(s).unwrap().unwrap()
    }

    #[test]
    fn moves() {
        assert_eq!(parse("G0 X5 Y0"), Cmd::Rapid(Target::new(5.0, 0.0)));
        assert_eq!(parse("G1 X12.5 Y-3"), Cmd::Linear(Target::new(12.5, -3.0)));
        assert_eq!(parse("  G1   Y.5\t"), Cmd::Linear(Target { x: None, y: Some(0.5) }));
        assert_eq!(parse("G1 Y2 X1"), Cmd::Linear(Target::new(1.0, 2.0)));
    }

    #[test]
    fn arcs() {
        assert_eq!(
            parse("G2 X10 Y10 R5 A90"),
            Cmd::Arc {
                target: Target::new(10.0, 10.0),
                radius: 5.0,
                angle_deg: 90.0,
                rotation: Rotation::Clockwise,
            }
        );
        assert_eq!(
            parse("G3 X1 Y1 R2 A45").opcode(),
            "G3",
        );
        assert_eq!(
            parse_line("G2 X10 Y10 R5"),
            Err(ParseError::MissingParameter {
                opcode: "G2",
                letter: 'A'
            })
        );
    }

    #[test]
    fn pen_and_dwell() {
        assert_eq!(parse("M03"), Cmd::PenDown);
        assert_eq!(parse("M05"), Cmd::PenUp);
        assert_eq!(parse("G4 P100"), Cmd::Dwell { ms: 100 });
        assert!(matches!(
            parse_line("G4 P1.5"),
            Err(ParseError::MalformedParameter(_))
        ));
        assert!(matches!(
            parse_line("G4"),
            Err(ParseError::MissingParameter { letter: 'P', .. })
        ));
    }

    #[test]
    fn zero_padded_opcodes() {
        assert_eq!(parse("G00 X1 Y1"), parse("G0 X1 Y1"));
        assert_eq!(parse("G01 X1 Y1"), parse("G1 X1 Y1"));
        assert_eq!(parse("M3"), Cmd::PenDown);
        assert_eq!(parse("M5"), Cmd::PenUp);
    }

    #[test]
    fn comments_and_blank_lines() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));
        assert_eq!(parse_line("; just a comment"), Ok(None));
        assert_eq!(parse_line("(header)"), Ok(None));
        assert_eq!(
            parse("G1 X1 (go right) Y2 ; and up"),
            Cmd::Linear(Target::new(1.0, 2.0))
        );
        assert_eq!(parse("G1 X1(no space)Y2"), Cmd::Linear(Target::new(1.0, 2.0)));
        assert_eq!(
            parse_line("G1 X1 (oops"),
            Err(ParseError::UnterminatedComment)
        );
    }

    #[test]
    fn unused_parameters_are_ignored() {
        assert_eq!(
            parse("G1 X1 Y2 F1500 Z0"),
            Cmd::Linear(Target::new(1.0, 2.0))
        );
        assert_eq!(parse("M03 S90"), Cmd::PenDown);
    }

    #[test]
    fn errors() {
        assert_eq!(
            parse_line("G1 XABC Y0"),
            Err(ParseError::MalformedParameter(word("XABC")))
        );
        assert_eq!(
            parse_line("G1 X1 Y0 Zfoo"),
            Err(ParseError::MalformedParameter(word("Zfoo")))
        );
        assert_eq!(
            parse_line("G1 Xinf Y0"),
            Err(ParseError::MalformedParameter(word("Xinf")))
        );
        assert_eq!(
            parse_line("G1 x1"),
            Err(ParseError::MalformedParameter(word("x1")))
        );
        assert_eq!(
            parse_line("G1 X1 X2"),
            Err(ParseError::DuplicateParameter('X'))
        );
        assert_eq!(
            parse_line("G28 X0"),
            Err(ParseError::UnknownCommand(word("G28")))
        );
        // Opcodes are case-sensitive.
        assert_eq!(
            parse_line("g1 X0"),
            Err(ParseError::UnknownCommand(word("g1")))
        );
        assert!(matches!(
            parse_line("HELLOTHISISAVERYLONGWORD"),
            Err(ParseError::UnknownCommand(w)) if w.as_str() == "HELLOTHISISAVERY"
        ));
    }

    proptest! {
        #[test]
        fn test_parse_formatted(x in -1000.0..1000.0f32, y in -1000.0..1000.0f32) {
            let line = format!("G1 X{x} Y{y}");
            prop_assert_eq!(parse_line(&line), Ok(Some(Cmd::Linear(Target::new(x, y)))));
        }

        // Whatever we throw at the parser, it returns an error instead of panicking.
        #[test]
        fn test_no_panics(s in "\\PC*") {
            let _ = parse_line(&s);
        }
    }
}
