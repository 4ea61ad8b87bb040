//! Wish list text format parser
//!
//! The community format is line oriented:
//!
//! ```text
//! title:My Wish List
//! description:PvE rolls for the current season
//! //notes:Block notes apply to the rolls below, up to the next blank line
//! dimwishlist:item=1234567&perks=111,222,333#notes:Inline notes win over block notes
//! dimwishlist:item=-1234567&perks=444
//! dimwishlist:item=-69420&perks=555
//! ```
//!
//! A negative item id marks a trash roll; `-69420` means "any item". Lines the
//! parser does not recognize are skipped so newer directives don't break older
//! readers. Only structurally broken headers and roll directives are errors.

use crate::error::ParseError;
use crate::model::{ANY_ITEM_HASH, ItemTarget, Polarity, WishListAndInfo, WishListRoll};
use std::collections::BTreeSet;
use tracing::debug;

const TITLE_PREFIX: &str = "title:";
const DESCRIPTION_PREFIX: &str = "description:";
const ROLL_PREFIX: &str = "dimwishlist:";
const BLOCK_NOTES_PREFIX: &str = "//notes:";
const INLINE_NOTES_MARKER: &str = "#notes:";
const ITEM_KEY: &str = "item=";
const PERKS_KEY: &str = "perks=";

/// Parse wish list text into rolls and header metadata
///
/// Parsing is all-or-nothing: on error no partial list is returned.
pub fn parse_wish_list(raw: &str) -> Result<WishListAndInfo, ParseError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let mut state = ParseState::default();
    for (index, line) in raw.lines().enumerate() {
        state.consume(index + 1, line)?;
    }

    debug!(
        "Parsed wish list: {} rolls, {} lines skipped",
        state.list.rolls.len(),
        state.skipped
    );
    Ok(state.list)
}

#[derive(Default)]
struct ParseState {
    list: WishListAndInfo,
    block_notes: Option<String>,
    skipped: usize,
}

impl ParseState {
    fn consume(&mut self, line_number: usize, line: &str) -> Result<(), ParseError> {
        let line = line.trim();

        if line.is_empty() {
            // A blank line ends the current notes block
            self.block_notes = None;
            return Ok(());
        }

        if let Some(value) = line.strip_prefix(TITLE_PREFIX) {
            let value = header_value(line_number, "title", value)?;
            self.list.title.get_or_insert(value);
            return Ok(());
        }

        if let Some(value) = line.strip_prefix(DESCRIPTION_PREFIX) {
            let value = header_value(line_number, "description", value)?;
            self.list.description.get_or_insert(value);
            return Ok(());
        }

        if let Some(notes) = line.strip_prefix(BLOCK_NOTES_PREFIX) {
            self.block_notes = non_empty(notes);
            return Ok(());
        }

        if let Some(directive) = line.strip_prefix(ROLL_PREFIX) {
            let roll = parse_roll(line_number, directive, self.block_notes.as_deref())?;
            self.list.rolls.push(roll);
            return Ok(());
        }

        self.skipped += 1;
        Ok(())
    }
}

fn header_value(line: usize, key: &'static str, value: &str) -> Result<String, ParseError> {
    non_empty(value).ok_or(ParseError::EmptyHeader { line, key })
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse the part of a roll line after `dimwishlist:`
fn parse_roll(line: usize, directive: &str, block_notes: Option<&str>) -> Result<WishListRoll, ParseError> {
    let (body, inline_notes) = match directive.split_once(INLINE_NOTES_MARKER) {
        Some((body, notes)) => (body, non_empty(notes)),
        None => (directive, None),
    };

    let mut fields = body.split('&').map(str::trim);

    let item_value = fields
        .next()
        .and_then(|field| field.strip_prefix(ITEM_KEY))
        .ok_or_else(|| malformed(line, "directive must start with item="))?;
    let (item, polarity) = parse_item(line, item_value)?;

    let mut perks = BTreeSet::new();
    for field in fields {
        if let Some(value) = field.strip_prefix(PERKS_KEY) {
            perks.extend(parse_perks(line, value)?);
        } else if field.strip_prefix(ITEM_KEY).is_some() {
            return Err(malformed(line, "item= given more than once"));
        } else if !field.is_empty() {
            debug!("Ignoring unknown roll field on line {}: {}", line, field);
        }
    }

    let roll = WishListRoll::new(item, perks, polarity);
    match inline_notes.as_deref().or(block_notes) {
        Some(notes) => Ok(roll.with_notes(notes)),
        None => Ok(roll),
    }
}

/// Item ids carry the polarity: `123` is a wish, `-123` is trash
fn parse_item(line: usize, value: &str) -> Result<(ItemTarget, Polarity), ParseError> {
    let (polarity, digits) = match value.chars().next() {
        Some('-') => (Polarity::Trash, &value[1..]),
        Some(c) if c.is_ascii_digit() => (Polarity::Wish, value),
        Some(marker) => return Err(ParseError::UnknownPolarity { line, marker }),
        None => return Err(malformed(line, "missing item id")),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(line, &format!("item id '{}' is not a number", value)));
    }

    let hash: u32 = digits
        .parse()
        .map_err(|_| malformed(line, &format!("item id '{}' is out of range", value)))?;

    if hash == 0 {
        return Err(malformed(line, "item id must not be zero"));
    }

    if polarity == Polarity::Trash && -i64::from(hash) == ANY_ITEM_HASH {
        return Ok((ItemTarget::AnyItem, Polarity::Wish));
    }

    Ok((ItemTarget::Item(hash), polarity))
}

/// Comma separated perk hashes; empty entries (trailing commas) are tolerated
fn parse_perks(line: usize, value: &str) -> Result<Vec<u32>, ParseError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|perk| !perk.is_empty())
        .map(|perk| match perk.parse::<u32>() {
            Ok(hash) if hash > 0 && perk.bytes().all(|b| b.is_ascii_digit()) => Ok(hash),
            _ => Err(malformed(line, &format!("perk '{}' is not a valid perk hash", perk))),
        })
        .collect()
}

fn malformed(line: usize, reason: &str) -> ParseError {
    ParseError::MalformedRoll {
        line,
        reason: reason.to_string(),
    }
}

/// Serialize a wish list back into the text format
///
/// Parsing the output yields the same rolls, title and description.
pub fn to_wish_list_text(list: &WishListAndInfo) -> String {
    let mut out = String::new();

    push_header(&mut out, TITLE_PREFIX, list.title.as_deref());
    push_header(&mut out, DESCRIPTION_PREFIX, list.description.as_deref());

    for roll in &list.rolls {
        out.push_str(&format_roll(roll));
        out.push('\n');
    }

    out
}

// A blank header would not parse back, so it is left out
fn push_header(out: &mut String, prefix: &str, value: Option<&str>) {
    let Some(value) = value.map(single_line).filter(|value| !value.is_empty()) else {
        return;
    };
    out.push_str(prefix);
    out.push_str(&value);
    out.push('\n');
}

/// Format one roll as a `dimwishlist:` line (without trailing newline)
pub fn format_roll(roll: &WishListRoll) -> String {
    let item = match (roll.item(), roll.polarity()) {
        (ItemTarget::AnyItem, _) => ANY_ITEM_HASH.to_string(),
        (ItemTarget::Item(hash), Polarity::Wish) => hash.to_string(),
        (ItemTarget::Item(hash), Polarity::Trash) => format!("-{}", hash),
    };

    let mut line = format!("{}{}{}", ROLL_PREFIX, ITEM_KEY, item);

    if !roll.perks().is_empty() {
        let perks: Vec<String> = roll.perks().iter().map(u32::to_string).collect();
        line.push('&');
        line.push_str(PERKS_KEY);
        line.push_str(&perks.join(","));
    }

    if let Some(notes) = roll.notes() {
        line.push_str(INLINE_NOTES_MARKER);
        line.push_str(&single_line(notes));
    }

    line
}

fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
