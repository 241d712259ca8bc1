use crate::chart::ChartImage;
use crate::error::{GardenReportError, Result};
use crate::schema::ColorTheme;
use serde::{Deserialize, Serialize};

/// Page dimensions in points. Defaults to A4 portrait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub page_width: f64,
    pub page_height: f64,
    pub top_offset: f64,
    pub bottom_margin: f64,
    pub left_margin: f64,
    pub right_margin: f64,
    pub header_y: f64,
    /// Distance of the footer line from the bottom edge.
    pub footer_offset: f64,
    pub title_height: f64,
    pub heading_height: f64,
    pub line_height: f64,
    pub row_height: f64,
    pub chart_height: f64,
    pub font_size: f64,
    /// Average glyph width as a fraction of the font size.
    pub char_width_factor: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            top_offset: 60.0,
            bottom_margin: 50.0,
            left_margin: 40.0,
            right_margin: 40.0,
            header_y: 28.0,
            footer_offset: 25.0,
            title_height: 36.0,
            heading_height: 24.0,
            line_height: 14.0,
            row_height: 18.0,
            chart_height: 260.0,
            font_size: 10.0,
            char_width_factor: 0.5,
        }
    }
}

impl PageGeometry {
    /// Lowest y a unit may reach.
    pub fn content_limit(&self) -> f64 {
        self.page_height - self.bottom_margin
    }

    pub fn content_width(&self) -> f64 {
        self.page_width - self.left_margin - self.right_margin
    }

    pub fn chars_per_line(&self) -> usize {
        let glyph = self.font_size * self.char_width_factor;
        ((self.content_width() / glyph).floor() as usize).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("page_width", self.page_width),
            ("page_height", self.page_height),
            ("title_height", self.title_height),
            ("heading_height", self.heading_height),
            ("line_height", self.line_height),
            ("row_height", self.row_height),
            ("chart_height", self.chart_height),
            ("font_size", self.font_size),
            ("char_width_factor", self.char_width_factor),
        ];
        for (name, value) in dims {
            if !value.is_finite() || value <= 0.0 {
                return Err(GardenReportError::InvalidConfig(format!(
                    "layout.{} must be > 0, got {}",
                    name, value
                )));
            }
        }

        if self.content_width() <= 0.0 {
            return Err(GardenReportError::InvalidConfig(
                "layout margins leave no horizontal room".to_string(),
            ));
        }
        if self.header_y < 0.0 || self.header_y + self.line_height > self.top_offset {
            return Err(GardenReportError::InvalidConfig(
                "layout.header_y must place the header above top_offset".to_string(),
            ));
        }
        if self.footer_offset < self.line_height || self.footer_offset > self.bottom_margin {
            return Err(GardenReportError::InvalidConfig(
                "layout.footer_offset must place the footer inside the bottom margin".to_string(),
            ));
        }

        let room = self.content_limit() - self.top_offset;
        let tallest = [
            self.title_height,
            self.heading_height + self.chart_height,
            self.heading_height + 2.0 * self.row_height,
            self.heading_height + self.line_height,
        ]
        .into_iter()
        .fold(0.0, f64::max);
        if tallest > room {
            return Err(GardenReportError::InvalidConfig(format!(
                "page content area of {} cannot hold a unit of {}",
                room, tallest
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Header {
        text: String,
    },
    Title {
        text: String,
    },
    Heading {
        text: String,
        color: [u8; 3],
    },
    TextLine {
        text: String,
    },
    TableRow {
        cells: Vec<String>,
        header: bool,
        fill: Option<[u8; 3]>,
    },
    Chart {
        image: ChartImage,
    },
    ChartPlaceholder {
        text: String,
    },
    Footer {
        text: String,
    },
}

impl Element {
    /// Headers and footers live in the margins, outside the content flow.
    pub fn is_content(&self) -> bool {
        !matches!(self, Element::Header { .. } | Element::Footer { .. })
    }

    pub fn text(&self) -> Option<String> {
        match self {
            Element::Header { text }
            | Element::Title { text }
            | Element::Heading { text, .. }
            | Element::TextLine { text }
            | Element::ChartPlaceholder { text }
            | Element::Footer { text } => Some(text.clone()),
            Element::TableRow { cells, .. } => Some(cells.join(" | ")),
            Element::Chart { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placed {
    pub y: f64,
    pub height: f64,
    pub element: Element,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    pub elements: Vec<Placed>,
}

impl Page {
    fn new(number: usize) -> Self {
        Self {
            number,
            elements: Vec::new(),
        }
    }
}

/// Content pass. Units are placed top to bottom; one that would cross
/// [`PageGeometry::content_limit`] starts a new page first.
pub struct DocumentBuilder {
    geometry: PageGeometry,
    running_header: Option<String>,
    pages: Vec<Page>,
    current: Page,
    cursor: f64,
    has_content: bool,
}

impl DocumentBuilder {
    pub fn new(geometry: PageGeometry, running_header: Option<String>) -> Self {
        let mut builder = Self {
            cursor: geometry.top_offset,
            geometry,
            running_header,
            pages: Vec::new(),
            current: Page::new(1),
            has_content: false,
        };
        builder.draw_header();
        builder
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn page_count(&self) -> usize {
        self.pages.len() + 1
    }

    fn draw_header(&mut self) {
        if let Some(text) = &self.running_header {
            self.current.elements.push(Placed {
                y: self.geometry.header_y,
                height: self.geometry.line_height,
                element: Element::Header { text: text.clone() },
            });
        }
    }

    fn start_page(&mut self) {
        let next = Page::new(self.current.number + 1);
        let finished = std::mem::replace(&mut self.current, next);
        self.pages.push(finished);
        self.cursor = self.geometry.top_offset;
        self.has_content = false;
        self.draw_header();
    }

    /// Starts a new page unless the current one is still untouched.
    pub fn page_break(&mut self) {
        if self.has_content {
            self.start_page();
        }
    }

    fn ensure_room(&mut self, height: f64) -> Result<()> {
        let limit = self.geometry.content_limit();
        if self.cursor + height > limit {
            self.page_break();
            if self.cursor + height > limit {
                return Err(GardenReportError::Layout(format!(
                    "unit of height {} does not fit on an empty page",
                    height
                )));
            }
        }
        Ok(())
    }

    fn place(&mut self, height: f64, element: Element) -> Result<()> {
        self.ensure_room(height)?;
        self.current.elements.push(Placed {
            y: self.cursor,
            height,
            element,
        });
        self.cursor += height;
        self.has_content = true;
        Ok(())
    }

    /// Vertical gap. Swallowed by a page break instead of carrying over.
    pub fn spacer(&mut self, height: f64) {
        if self.cursor + height > self.geometry.content_limit() {
            self.page_break();
        } else {
            self.cursor += height;
        }
    }

    pub fn title(&mut self, text: &str) -> Result<()> {
        self.place(
            self.geometry.title_height,
            Element::Title {
                text: text.to_string(),
            },
        )
    }

    /// Places a heading only if the first unit that follows it fits too.
    pub fn heading(&mut self, text: &str, color: [u8; 3], next_height: f64) -> Result<()> {
        self.ensure_room(self.geometry.heading_height + next_height)?;
        self.place(
            self.geometry.heading_height,
            Element::Heading {
                text: text.to_string(),
                color,
            },
        )
    }

    pub fn text_line(&mut self, text: &str) -> Result<()> {
        self.place(
            self.geometry.line_height,
            Element::TextLine {
                text: text.to_string(),
            },
        )
    }

    /// Word-wraps `text` to the content width. Blank-line separated
    /// paragraphs are kept apart by an empty line.
    pub fn paragraph(&mut self, text: &str) -> Result<()> {
        let width = self.geometry.chars_per_line();
        let paragraphs: Vec<&str> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        for (i, paragraph) in paragraphs.iter().enumerate() {
            if i > 0 {
                self.spacer(self.geometry.line_height);
            }
            for line in wrap_text(paragraph, width) {
                self.text_line(&line)?;
            }
        }
        Ok(())
    }

    /// Places a table row by row. Cell text wraps to the column width and the
    /// row grows to its tallest cell. A row taller than an empty page is split
    /// into continuation rows. The column header row is repeated at the top of
    /// every page the table spills onto.
    pub fn table(
        &mut self,
        columns: &[String],
        rows: &[Vec<String>],
        theme: ColorTheme,
    ) -> Result<()> {
        let cell_width = (self.geometry.chars_per_line() / columns.len().max(1)).max(4);
        let header_height = self.row_height_for(line_count(columns, cell_width));
        let header = Element::TableRow {
            cells: columns.to_vec(),
            header: true,
            fill: Some(theme.primary),
        };

        let room = self.geometry.content_limit() - self.geometry.top_offset - header_height;
        let lines_per_row =
            (((room - self.geometry.row_height) / self.geometry.line_height).floor() as usize) + 1;

        let mut segments = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let fill = if i % 2 == 1 { Some(theme.light) } else { None };
            for cells in split_row(row, cell_width, lines_per_row.max(1)) {
                segments.push((cells, fill));
            }
        }

        // the header row never ends up alone at the bottom of a page
        let first = segments
            .first()
            .map(|(cells, _)| self.row_height_for(line_count(cells, cell_width)))
            .unwrap_or(self.geometry.row_height);
        self.ensure_room(header_height + first)?;
        self.place(header_height, header.clone())?;

        for (cells, fill) in segments {
            let height = self.row_height_for(line_count(&cells, cell_width));
            if self.cursor + height > self.geometry.content_limit() {
                self.start_page();
                self.place(header_height, header.clone())?;
            }
            self.place(
                height,
                Element::TableRow {
                    cells,
                    header: false,
                    fill,
                },
            )?;
        }
        Ok(())
    }

    fn row_height_for(&self, lines: usize) -> f64 {
        self.geometry.row_height + lines.saturating_sub(1) as f64 * self.geometry.line_height
    }

    pub fn chart(&mut self, image: ChartImage) -> Result<()> {
        self.place(self.geometry.chart_height, Element::Chart { image })
    }

    pub fn chart_placeholder(&mut self, text: &str) -> Result<()> {
        self.place(
            self.geometry.line_height,
            Element::ChartPlaceholder {
                text: text.to_string(),
            },
        )
    }

    /// Ends the content pass.
    pub fn finish(mut self) -> PaginatedDocument {
        self.pages.push(self.current);
        PaginatedDocument {
            geometry: self.geometry,
            pages: self.pages,
        }
    }
}

/// Output of the content pass. Page contents no longer change.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedDocument {
    geometry: PageGeometry,
    pages: Vec<Page>,
}

impl PaginatedDocument {
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Placed> {
        self.pages.iter().flat_map(|p| p.elements.iter())
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.elements()
            .filter_map(|p| p.element.text())
            .any(|t| t.contains(needle))
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Footer pass: stamps "Page i of N" on every page.
pub fn stamp_footers(content: PaginatedDocument, name: impl Into<String>) -> Document {
    let total = content.pages.len();
    let geometry = content.geometry;
    let footer_y = geometry.page_height - geometry.footer_offset;

    let pages = content
        .pages
        .into_iter()
        .map(|mut page| {
            page.elements.push(Placed {
                y: footer_y,
                height: geometry.line_height,
                element: Element::Footer {
                    text: format!("Page {} of {}", page.number, total),
                },
            });
            page
        })
        .collect();

    Document {
        name: name.into(),
        geometry,
        pages,
    }
}

/// Greedy word wrap. Words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for chunk in chars.chunks(width) {
            let piece: String = chunk.iter().collect();
            let line_len = line.chars().count();
            if line_len == 0 {
                line = piece;
            } else if line_len + 1 + chunk.len() <= width {
                line.push(' ');
                line.push_str(&piece);
            } else {
                lines.push(std::mem::take(&mut line));
                line = piece;
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn wrap_cells(cells: &[String], width: usize) -> Vec<Vec<String>> {
    cells
        .iter()
        .map(|c| {
            let lines = wrap_text(c, width);
            if lines.is_empty() {
                vec![String::new()]
            } else {
                lines
            }
        })
        .collect()
}

fn line_count(cells: &[String], width: usize) -> usize {
    wrap_cells(cells, width)
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(1)
}

/// Cuts a row into pieces of at most `max_lines` wrapped lines each. A row
/// that fits is returned untouched.
fn split_row(row: &[String], width: usize, max_lines: usize) -> Vec<Vec<String>> {
    let wrapped = wrap_cells(row, width);
    let total = wrapped.iter().map(Vec::len).max().unwrap_or(1);
    if total <= max_lines {
        return vec![row.to_vec()];
    }

    (0..total)
        .step_by(max_lines)
        .map(|from| {
            wrapped
                .iter()
                .map(|lines| {
                    let to = (from + max_lines).min(lines.len());
                    lines.get(from..to).map(|l| l.join(" ")).unwrap_or_default()
                })
                .collect()
        })
        .collect()
}
