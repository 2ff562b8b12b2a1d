//! Course detail panel extraction.
//!
//! An expanded listing row reveals a `td.coursepadding` panel whose content is
//! loosely structured text: an `h3` title, then label/value lines separated by
//! `<br>` elements, with the occasional `ul` (class level restrictions).
//!
//! ```text
//! <h3>CSE 150: Operating Systems</h3>
//! Units: 4<br>
//! Introduction to the design of operating systems.<br>
//! Prerequisite Courses: (CSE 031 or EE 060), CSE 100 and MATH 024<br>
//! Open only to the following class level(s):<ul><li>Junior</li></ul>
//! Repeats Allowed for Credit: 2<br>
//! ```
//!
//! Lines are matched against [`LINE_RULES`] in order. Nothing here fails: a
//! line nobody recognizes is ignored and a value that doesn't parse leaves its
//! field as [`Field::NotAvailable`].

use ego_tree::NodeRef;
use html_scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;
use tracing::trace;

use crate::acalog::models::{CourseRecord, Credits, Field};

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").unwrap());
static BREAK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("br").unwrap());
static LIST_ITEM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());

/// Elements whose text flows into the surrounding line rather than ending it.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "cite", "code", "em", "font", "i", "small", "span", "strong", "sub", "sup",
    "u",
];

const CLASS_LEVEL_MARKER: &str = "Open only to the following class level(s):";
const CONCURRENT_PREREQ_LABEL: &str = "Prerequisite Courses with Concurrent Option";
const PREREQ_LABEL: &str = "Prerequisite Courses";

/// The panel's nodes flattened into document order.
struct Panel<'a> {
    nodes: Vec<NodeRef<'a, Node>>,
}

impl<'a> Panel<'a> {
    fn new(fragment: &'a Html) -> Self {
        Self {
            nodes: fragment.tree.root().descendants().collect(),
        }
    }

    /// Items of the first `ul` that appears after `node` in document order.
    fn list_after(&self, node: NodeRef<'a, Node>) -> Option<Vec<String>> {
        let start = self.nodes.iter().position(|n| n.id() == node.id())?;
        let list = self.nodes[start + 1..]
            .iter()
            .filter_map(|n| ElementRef::wrap(*n))
            .find(|el| el.value().name() == "ul")?;

        Some(
            list.select(&LIST_ITEM)
                .map(|li| normalize(&li.text().collect::<String>()))
                .filter(|level| !level.is_empty())
                .collect(),
        )
    }
}

/// The text on either side of one `<br>`.
struct Line<'a> {
    /// Inline content between this break and the previous break or block.
    text: String,
    /// Inline content after this break, up to the next break or block.
    following: String,
    br: NodeRef<'a, Node>,
}

/// One extraction rule: a predicate on a line and the field update it drives.
struct Rule {
    name: &'static str,
    matches: fn(&Line<'_>) -> bool,
    apply: fn(&Panel<'_>, &Line<'_>, &mut CourseRecord),
    /// A claiming rule consumes the line; later claiming rules don't see it.
    claims_line: bool,
}

/// Ordered rule table. Order matters: the concurrent-option prerequisite
/// label must be tried before the plain one. Non-claiming rules see every line.
const LINE_RULES: &[Rule] = &[
    Rule {
        name: "units",
        matches: |line| line.text.starts_with("Units:"),
        apply: |_, line, record| {
            record.credits = trailing_integer(&line.text).map(Credits::Fixed).into();
        },
        claims_line: true,
    },
    Rule {
        name: "unit_range",
        matches: |line| line.text.starts_with("Lower Unit Limit"),
        apply: |_, line, record| {
            let lower = trailing_integer(&line.text);
            let upper = line
                .following
                .starts_with("Upper Unit Limit:")
                .then(|| trailing_integer(&line.following))
                .flatten();
            record.credits = lower
                .zip(upper)
                .map(|(lower, upper)| Credits::range(lower, upper))
                .into();
        },
        claims_line: true,
    },
    Rule {
        name: "coreqs",
        matches: |line| line.text.starts_with(CONCURRENT_PREREQ_LABEL),
        apply: |_, line, record| record.coreqs = split_requisites(&line.text).into(),
        claims_line: true,
    },
    Rule {
        name: "prereqs",
        matches: |line| {
            line.text.starts_with(PREREQ_LABEL) && !line.text.starts_with(CONCURRENT_PREREQ_LABEL)
        },
        apply: |_, line, record| record.prereqs = split_requisites(&line.text).into(),
        claims_line: true,
    },
    Rule {
        name: "repeats_allowed",
        matches: |line| line.text.starts_with("Repeats Allowed"),
        apply: |_, line, record| {
            record.repeats_allowed_for_credit = line
                .text
                .split_once(':')
                .and_then(|(_, count)| count.trim().parse().ok())
                .into();
        },
        claims_line: true,
    },
    Rule {
        name: "class_levels",
        matches: |line| line.following.contains(CLASS_LEVEL_MARKER),
        apply: |panel, line, record| record.class_levels = panel.list_after(line.br).into(),
        claims_line: false,
    },
    // Any line ending in a period, labelled or not; the last one wins.
    Rule {
        name: "description",
        matches: |line| line.text.ends_with('.'),
        apply: |_, line, record| record.course_description = Field::Value(line.text.clone()),
        claims_line: false,
    },
];

/// Turns the outer HTML of one expanded detail panel into a [`CourseRecord`].
pub fn extract_course(markup: &str) -> CourseRecord {
    let fragment = Html::parse_fragment(markup);
    let panel = Panel::new(&fragment);
    let mut record = CourseRecord::default();

    if let Some((code, name)) = parse_title(&fragment) {
        record.course_code = Field::Value(code);
        record.course_name = Field::Value(name);
    }

    for br in fragment.select(&BREAK) {
        let line = Line {
            text: inline_run(*br, |n| n.prev_sibling(), true),
            following: inline_run(*br, |n| n.next_sibling(), false),
            br: *br,
        };

        let mut claimed = false;
        for rule in LINE_RULES {
            if rule.claims_line && claimed {
                continue;
            }
            if (rule.matches)(&line) {
                trace!(rule = rule.name, line = line.text.as_str(), "Extraction rule matched");
                (rule.apply)(&panel, &line, &mut record);
                claimed |= rule.claims_line;
            }
        }
    }

    record
}

/// Splits the `h3` heading into `(course_code, course_name)` on its first colon.
fn parse_title(fragment: &Html) -> Option<(String, String)> {
    let heading = fragment.select(&TITLE).next()?;
    let text = normalize(&heading.text().collect::<String>());
    let (code, name) = text.split_once(':')?;
    Some((code.trim().to_owned(), name.trim().to_owned()))
}

/// Collects the inline text adjacent to `start`, walking siblings with `step`
/// until a break or block-level element ends the line.
fn inline_run<'a>(
    start: NodeRef<'a, Node>,
    step: fn(&NodeRef<'a, Node>) -> Option<NodeRef<'a, Node>>,
    backwards: bool,
) -> String {
    let mut parts = Vec::new();
    let mut cursor = step(&start);

    while let Some(node) = cursor {
        match node.value() {
            Node::Text(text) => parts.push((**text).to_owned()),
            Node::Comment(_) => {}
            Node::Element(el) if INLINE_ELEMENTS.contains(&el.name()) => {
                if let Some(el) = ElementRef::wrap(node) {
                    parts.push(el.text().collect());
                }
            }
            _ => break,
        }
        cursor = step(&node);
    }

    if backwards {
        parts.reverse();
    }
    normalize(&parts.concat())
}

/// Collapses every whitespace run (non-breaking spaces included) to one space.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses the last whitespace-delimited token of `text` as an integer.
fn trailing_integer(text: &str) -> Option<u32> {
    text.split_whitespace().last()?.parse().ok()
}

/// Splits a requisite line into atomic course references.
///
/// Parentheses are dropped, the remainder split on commas, and any clause
/// joined with ` and ` split again. `or` groups stay together.
fn split_requisites(line: &str) -> Option<Vec<String>> {
    let (_, body) = line.split_once(':')?;
    let body = normalize(&body.replace(['(', ')'], ""));

    Some(
        body.split(',')
            .flat_map(|clause| clause.split(" and "))
            .map(str::trim)
            .filter(|reference| !reference.is_empty())
            .map(str::to_owned)
            .collect(),
    )
}
