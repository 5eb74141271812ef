//! A4 PDF layout of rendered report text
//!
//! The input is plain text with two markers: a line starting with `# ` is the
//! document title and `## ` starts a section. Everything else is body text,
//! wrapped to the page width. Pages break automatically.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const MARGIN_TOP: f32 = 20.0;
const MARGIN_BOTTOM: f32 = 20.0;

const TITLE_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
const FOOTER_SIZE: f32 = 8.0;

/// Characters per body line at 10pt Helvetica over 170 mm
const WRAP_WIDTH: usize = 95;

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Title(String),
    Heading(String),
    Text(String),
    Gap,
}

fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    for line in text.lines() {
        let line = line.trim_end();
        if let Some(title) = line.strip_prefix("# ") {
            blocks.push(Block::Title(title.trim().to_string()));
        } else if let Some(heading) = line.strip_prefix("## ") {
            blocks.push(Block::Heading(heading.trim().to_string()));
        } else if line.trim().is_empty() {
            if !matches!(blocks.last(), Some(Block::Gap) | None) {
                blocks.push(Block::Gap);
            }
        } else {
            for wrapped in wrap(line, WRAP_WIDTH) {
                blocks.push(Block::Text(wrapped));
            }
        }
    }
    blocks
}

/// Greedy word wrap; words longer than `width` are split
fn wrap(line: &str, width: usize) -> Vec<String> {
    let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
    let mut lines = Vec::new();
    let mut current = indent.clone();

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.trim().is_empty() {
                lines.push(std::mem::replace(&mut current, indent.clone()));
            }
            let rest = word.split_off(width);
            lines.push(format!("{}{}", indent, word.iter().collect::<String>()));
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let needed = if current.trim().is_empty() {
            current.chars().count() + word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.trim().is_empty() {
            lines.push(std::mem::replace(&mut current, indent.clone()));
        }
        if !current.trim().is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.trim().is_empty() {
        lines.push(current);
    }
    lines
}

/// Builtin PDF fonts only cover ASCII reliably
fn ascii_fold(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            'º' | '°' => 'o',
            'ª' => 'a',
            '³' => '3',
            '²' => '2',
            '–' | '—' => '-',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect()
}

struct Cursor {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    page: usize,
}

impl Cursor {
    fn footer(&self) {
        self.layer.use_text(
            format!("Pagina {}", self.page),
            FOOTER_SIZE,
            Mm(PAGE_WIDTH - MARGIN_LEFT - 15.0),
            Mm(MARGIN_BOTTOM / 2.0),
            &self.regular,
        );
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height >= MARGIN_BOTTOM {
            return;
        }
        self.page += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Page {}", self.page),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN_TOP;
        self.footer();
    }

    fn write(&mut self, text: &str, size: f32, bold: bool, line_height: f32) {
        self.ensure_room(line_height);
        self.y -= line_height;
        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(ascii_fold(text), size, Mm(MARGIN_LEFT), Mm(self.y), font);
    }
}

/// Lay out `text` as an A4 document and return the PDF bytes
pub fn render_pdf(title: &str, text: &str) -> Result<Vec<u8>, printpdf::Error> {
    let (doc, page, layer) = PdfDocument::new(
        ascii_fold(title),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Page 1",
    );
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
    let layer = doc.get_page(page).get_layer(layer);

    let mut cursor = Cursor {
        doc,
        layer,
        regular,
        bold,
        y: PAGE_HEIGHT - MARGIN_TOP,
        page: 1,
    };
    cursor.footer();

    for block in parse_blocks(text) {
        match block {
            Block::Title(t) => cursor.write(&t, TITLE_SIZE, true, 9.0),
            Block::Heading(h) => {
                // keep a heading together with its first line
                cursor.ensure_room(14.0);
                cursor.y -= 2.0;
                cursor.write(&h, HEADING_SIZE, true, 7.0);
            }
            Block::Text(t) => cursor.write(&t, BODY_SIZE, false, 5.0),
            Block::Gap => cursor.y -= 3.0,
        }
    }

    cursor.doc.save_to_bytes()
}
