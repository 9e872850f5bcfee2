//! Minimal PDF 1.4 writer for printable conversation exports.
//!
//! Text is set in the standard Helvetica faces with WinAnsi encoding, so no
//! font program is embedded. Characters outside that encoding print as `?`.

#[cfg(test)]
#[path = "pdf_test.rs"]
mod tests;

use chrono::{DateTime, Utc};

use crate::models::{Conversation, Role};

use super::format_timestamp;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const FONT_SIZE: f32 = 10.0;
const LINE_HEIGHT: f32 = 14.0;
const WRAP_COLUMNS: usize = 88;

pub(crate) const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2.0 * MARGIN) / LINE_HEIGHT) as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Face {
    Regular,
    Bold,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Line {
    pub text: String,
    pub face: Face,
    pub color: (f32, f32, f32),
    /// Index of the message the line belongs to, `None` for page furniture
    pub message: Option<usize>,
}

impl Line {
    fn new(text: impl Into<String>, face: Face) -> Self {
        Self {
            text: text.into(),
            face,
            color: (0.2, 0.2, 0.2),
            message: None,
        }
    }

    fn blank() -> Self {
        Self::new("", Face::Regular)
    }

    fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

fn role_color(role: Role) -> (f32, f32, f32) {
    match role {
        Role::User => (0.4, 0.49, 0.92),
        Role::Assistant => (0.46, 0.29, 0.64),
        Role::System => (0.55, 0.45, 0.1),
    }
}

/// Greedy word wrap at `WRAP_COLUMNS` chars. Words longer than a line are
/// split.
pub(crate) fn wrap(text: &str) -> Vec<String> {
    let mut lines = vec![];
    for paragraph in text.replace('\t', "    ").split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut current = String::new();
        let mut width = 0;

        for word in paragraph.split_whitespace() {
            let mut chars = word.chars().collect::<Vec<_>>();
            if width > 0 && width + 1 + chars.len() <= WRAP_COLUMNS {
                current.push(' ');
                current.extend(&chars);
                width += 1 + chars.len();
                continue;
            }
            if width > 0 {
                lines.push(std::mem::take(&mut current));
            }
            while chars.len() > WRAP_COLUMNS {
                let rest = chars.split_off(WRAP_COLUMNS);
                lines.push(chars.into_iter().collect());
                chars = rest;
            }
            width = chars.len();
            current = chars.into_iter().collect();
        }

        lines.push(current);
    }
    lines
}

/// Builds the document as blocks of lines. The header is the first block,
/// then one block per message.
pub(crate) fn layout_blocks(conversation: &Conversation, exported_at: DateTime<Utc>) -> Vec<Vec<Line>> {
    let mut blocks = vec![];

    let mut header = vec![
        Line::new(format!("Conversation: {}", conversation.id()), Face::Bold),
        Line::new(format!("Export Date: {}", format_timestamp(exported_at)), Face::Regular),
        Line::new(format!("Total Messages: {}", conversation.len()), Face::Regular),
    ];
    for (key, value) in conversation.metadata() {
        header.push(Line::new(format!("{key}: {value}"), Face::Regular));
    }
    header.push(Line::blank());
    if conversation.is_empty() {
        header.push(Line::new("No messages.", Face::Regular));
    }
    blocks.push(header);

    for (idx, msg) in conversation.messages().iter().enumerate() {
        let color = role_color(msg.role());
        let mut block = vec![Line {
            text: format!("{}  [{}]", msg.role().label(), format_timestamp(msg.timestamp())),
            face: Face::Bold,
            color,
            message: Some(idx),
        }];
        for text in wrap(msg.content()) {
            block.push(Line {
                text,
                face: Face::Regular,
                color: (0.1, 0.1, 0.1),
                message: Some(idx),
            });
        }
        block.push(Line::blank());
        blocks.push(block);
    }
    blocks
}

/// Distributes blocks over pages. A block that does not fit in the space
/// left on the current page starts a new page, unless it is taller than a
/// whole page anyway.
pub(crate) fn paginate(blocks: Vec<Vec<Line>>) -> Vec<Vec<Line>> {
    let mut pages: Vec<Vec<Line>> = vec![];
    let mut current: Vec<Line> = vec![];

    for block in blocks {
        let height = block.len();
        if !current.is_empty()
            && current.len() + height > LINES_PER_PAGE
            && height <= LINES_PER_PAGE
        {
            pages.push(std::mem::take(&mut current));
        }
        for line in block {
            if current.len() == LINES_PER_PAGE {
                pages.push(std::mem::take(&mut current));
            }
            if current.is_empty() && line.is_blank() {
                continue;
            }
            current.push(line);
        }
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

/// Maps a char to its WinAnsiEncoding byte.
fn win_ansi(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\u{a0}'..='\u{ff}' => c as u32 as u8,
        '€' => 0x80,
        '…' => 0x85,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        _ => b'?',
    }
}

fn push_pdf_string(out: &mut Vec<u8>, text: &str) {
    out.push(b'(');
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            c => out.push(win_ansi(c)),
        }
    }
    out.push(b')');
}

fn page_content(lines: &[Line], page_no: usize, page_count: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN - FONT_SIZE;
    for line in lines {
        if !line.is_blank() {
            let font = match line.face {
                Face::Regular => "F1",
                Face::Bold => "F2",
            };
            let (r, g, b) = line.color;
            out.extend_from_slice(
                format!("BT /{font} {FONT_SIZE} Tf {r:.2} {g:.2} {b:.2} rg {MARGIN} {y:.1} Td ")
                    .as_bytes(),
            );
            push_pdf_string(&mut out, &line.text);
            out.extend_from_slice(b" Tj ET\n");
        }
        y -= LINE_HEIGHT;
    }

    let footer = format!("Page {page_no} of {page_count}");
    out.extend_from_slice(
        format!("BT /F1 8 Tf 0.5 0.5 0.5 rg {} {} Td ", PAGE_WIDTH / 2.0 - 20.0, MARGIN / 2.0)
            .as_bytes(),
    );
    push_pdf_string(&mut out, &footer);
    out.extend_from_slice(b" Tj ET\n");
    out
}

struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: vec![],
        }
    }

    /// Objects must be written in id order starting at 1.
    fn object(&mut self, body: &[u8]) {
        self.offsets.push(self.buf.len());
        let id = self.offsets.len();
        self.buf.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, data: &[u8]) {
        let mut body = format!("<< /Length {} >>\nstream\n", data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.object(&body);
    }

    fn finish(mut self, root: usize, info: usize) -> Vec<u8> {
        let xref = self.buf.len();
        let size = self.offsets.len() + 1;
        self.buf
            .extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
        for offset in &self.offsets {
            self.buf
                .extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        self.buf.extend_from_slice(
            format!(
                "trailer\n<< /Size {size} /Root {root} 0 R /Info {info} 0 R >>\nstartxref\n{xref}\n%%EOF\n"
            )
            .as_bytes(),
        );
        self.buf
    }
}

pub fn render(conversation: &Conversation, exported_at: DateTime<Utc>) -> Vec<u8> {
    let pages = paginate(layout_blocks(conversation, exported_at));
    let page_count = pages.len();

    // 1 catalog, 2 page tree, 3-4 fonts, 5 info, then a page and its
    // content stream for every page.
    const FIRST_PAGE_ID: usize = 6;
    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", FIRST_PAGE_ID + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");

    let mut pdf = PdfWriter::new();
    pdf.object(b"<< /Type /Catalog /Pages 2 0 R >>");
    pdf.object(format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>").as_bytes());
    pdf.object(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    );
    pdf.object(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
    );

    let mut info = b"<< /Title ".to_vec();
    push_pdf_string(&mut info, &format!("Conversation {}", conversation.id()));
    info.extend_from_slice(b" /Producer ");
    push_pdf_string(&mut info, &crate::config::user_agent());
    info.extend_from_slice(
        format!(" /CreationDate (D:{}Z) >>", exported_at.format("%Y%m%d%H%M%S")).as_bytes(),
    );
    pdf.object(&info);

    for (i, lines) in pages.iter().enumerate() {
        let content_id = FIRST_PAGE_ID + 2 * i + 1;
        pdf.object(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {content_id} 0 R >>"
            )
            .as_bytes(),
        );
        pdf.stream(&page_content(lines, i + 1, page_count));
    }

    pdf.finish(1, 5)
}
