use crate::error::{Error, Result};
use crate::models::paper::ComposedPaper;
use async_trait::async_trait;
use rust_xlsxwriter::*;
use serde::Deserialize;
use std::sync::Arc;
use tokio::fs;
use tokio::process::Command;

const NO_ANSWER: &str = "Answer not available";

/// Output formats of the document renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    fn convert_to(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf:writer_pdf_Export",
            DocumentFormat::Docx => "docx:MS Word 2007 XML",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKeyFormat {
    #[default]
    Txt,
    Pdf,
    Xlsx,
}

/// Layout-free content of a rendered document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub header_lines: Vec<String>,
    pub date_line: String,
    pub sections: Vec<DocumentSection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSection {
    pub heading: String,
    pub items: Vec<DocumentItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentItem {
    pub text: String,
    pub options: Vec<String>,
}

impl Document {
    pub fn to_html(&self) -> String {
        let mut html = String::from(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n\
             body { font-family: Helvetica, Arial, sans-serif; font-size: 11pt; margin: 40px; }\n\
             h1 { text-align: center; font-size: 16pt; margin-bottom: 4px; }\n\
             p.center { text-align: center; font-size: 12pt; margin: 2px; }\n\
             p.date { text-align: right; }\n\
             h2 { font-size: 13pt; margin-top: 24px; }\n\
             p.item { margin-left: 20px; }\n\
             ol.options { list-style-type: lower-alpha; margin-left: 40px; }\n\
             </style>\n",
        );
        html.push_str(&format!("<title>{}</title>\n</head>\n<body>\n", escape_html(&self.title)));
        html.push_str(&format!("<h1>{}</h1>\n", escape_html(&self.title)));
        for line in &self.header_lines {
            html.push_str(&format!("<p class=\"center\">{}</p>\n", escape_html(line)));
        }
        html.push_str(&format!("<p class=\"date\">{}</p>\n<hr>\n", escape_html(&self.date_line)));

        for section in &self.sections {
            html.push_str(&format!("<h2>{}</h2>\n", escape_html(&section.heading)));
            for item in &section.items {
                html.push_str(&format!("<p class=\"item\">{}</p>\n", escape_html(&item.text)));
                if !item.options.is_empty() {
                    html.push_str("<ol class=\"options\">\n");
                    for option in &item.options {
                        html.push_str(&format!("<li>{}</li>\n", escape_html(option)));
                    }
                    html.push_str("</ol>\n");
                }
            }
        }
        html.push_str("</body>\n</html>\n");
        html
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn section_letter(idx: usize) -> char {
    (b'A' + (idx % 26) as u8) as char
}

/// Converts a document into a binary office format.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, document: &Document, format: DocumentFormat) -> Result<Vec<u8>>;
}

/// Renders through a headless LibreOffice process.
#[derive(Clone)]
pub struct LibreOfficeRenderer {
    binary: String,
}

impl LibreOfficeRenderer {
    pub fn new(binary: String) -> Self {
        Self { binary }
    }

    async fn convert(&self, temp_dir: &str, format: DocumentFormat) -> Result<Vec<u8>> {
        let input = format!("{}/document.html", temp_dir);
        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--norestore")
            .arg("--infilter=HTML (StarWriter)")
            .arg("--convert-to")
            .arg(format.convert_to())
            .arg("--outdir")
            .arg(temp_dir)
            .arg(&input)
            .output()
            .await
            .map_err(|e| Error::Render(format!("Failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(Error::Render(format!(
                "LibreOffice {} conversion failed: {}",
                format.extension(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let converted = format!("{}/document.{}", temp_dir, format.extension());
        fs::read(&converted)
            .await
            .map_err(|_| Error::Render(format!("LibreOffice produced no {} output", format.extension())))
    }
}

#[async_trait]
impl DocumentRenderer for LibreOfficeRenderer {
    async fn render(&self, document: &Document, format: DocumentFormat) -> Result<Vec<u8>> {
        let temp_dir = format!("/tmp/paper_render_{}", uuid::Uuid::new_v4());
        fs::create_dir_all(&temp_dir).await?;

        let result = match fs::write(format!("{}/document.html", temp_dir), document.to_html()).await {
            Ok(()) => self.convert(&temp_dir, format).await,
            Err(e) => Err(e.into()),
        };

        let _ = fs::remove_dir_all(&temp_dir).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Document rendering failed");
        }
        result
    }
}

/// A finished export ready to be sent as a download.
#[derive(Debug, Clone)]
pub struct Export {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Builds every downloadable artifact of a paper from its snapshot.
///
/// Nothing here reads the clock: all dates come from the paper, so
/// exporting the same snapshot twice gives the same content.
#[derive(Clone)]
pub struct ExportService {
    renderer: Arc<dyn DocumentRenderer>,
}

impl ExportService {
    pub fn new(renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self { renderer }
    }

    fn header(paper: &ComposedPaper, title_suffix: Option<&str>) -> (String, Vec<String>, String) {
        let meta = &paper.meta;
        let title = match title_suffix {
            Some(suffix) => format!("{} - {}", meta.school_name, suffix),
            None => meta.school_name.clone(),
        };
        let mut lines = vec![format!("{} Board Examination", meta.board)];
        if !meta.exam_name.trim().is_empty() {
            lines.push(meta.exam_name.clone());
        }
        lines.push(format!("Class {} - {}", meta.class_name, meta.subject));
        lines.push(format!(
            "Total Questions: {}    Maximum Marks: {}",
            paper.total_questions, paper.total_marks
        ));
        let date = format!("Date: {}", paper.created_at.format("%d-%m-%Y"));
        (title, lines, date)
    }

    /// The question paper: one lettered section per question kind.
    pub fn paper_document(paper: &ComposedPaper) -> Document {
        let (title, header_lines, date_line) = Self::header(paper, None);
        let sections = paper
            .sections()
            .iter()
            .enumerate()
            .map(|(idx, section)| DocumentSection {
                heading: format!("Section {} - {}", section_letter(idx), section.kind.section_title()),
                items: section
                    .questions
                    .iter()
                    .map(|q| DocumentItem {
                        text: format!(
                            "Q{}. {}   ({} marks)",
                            q.number.unwrap_or_default(),
                            q.text,
                            q.marks
                        ),
                        options: q.options.clone(),
                    })
                    .collect(),
            })
            .collect();

        Document {
            title,
            header_lines,
            date_line,
            sections,
        }
    }

    pub fn answer_key_document(paper: &ComposedPaper) -> Document {
        let (title, header_lines, date_line) = Self::header(paper, Some("Answer Key"));
        let items = paper
            .questions
            .iter()
            .map(|q| {
                let mut text = format!(
                    "Q{}. {}",
                    q.number.unwrap_or_default(),
                    q.answer.as_deref().unwrap_or(NO_ANSWER)
                );
                if let Some(explanation) = &q.explanation {
                    text.push_str(&format!(" ({})", explanation));
                }
                DocumentItem {
                    text,
                    options: Vec::new(),
                }
            })
            .collect();

        Document {
            title,
            header_lines,
            date_line,
            sections: vec![DocumentSection {
                heading: "Answers".to_string(),
                items,
            }],
        }
    }

    pub fn answer_key_text(paper: &ComposedPaper) -> String {
        let meta = &paper.meta;
        let mut out = format!(
            "ANSWER KEY\n{}\n{} Board Examination\nClass {} - {}\nPaper: {}\nDate: {}\n\n",
            meta.school_name,
            meta.board,
            meta.class_name,
            meta.subject,
            paper.paper_id,
            paper.created_at.format("%d-%m-%Y")
        );
        for q in &paper.questions {
            out.push_str(&format!(
                "Q{}. [{}] {}\n    Answer: {}\n",
                q.number.unwrap_or_default(),
                q.kind.as_str(),
                q.text,
                q.answer.as_deref().unwrap_or(NO_ANSWER)
            ));
            if let Some(explanation) = &q.explanation {
                out.push_str(&format!("    Explanation: {}\n", explanation));
            }
        }
        out.push_str(&format!(
            "\nTotal Questions: {}\nTotal Marks: {}\n",
            paper.total_questions, paper.total_marks
        ));
        out
    }

    pub fn answer_key_xlsx(paper: &ComposedPaper) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        // creation time comes from the paper, never the clock
        let created = ExcelDateTime::from_timestamp(paper.created_at.timestamp())?;
        workbook.set_properties(
            &DocProperties::new()
                .set_title(format!("{} answer key", paper.paper_id))
                .set_creation_datetime(&created),
        );
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Answer Key")?;

        let header_bg = Color::RGB(0x0F172A);
        let border_color = Color::RGB(0xE2E8F0);

        let columns = [
            ("No.", 8.0),
            ("Type", 16.0),
            ("Question", 60.0),
            ("Marks", 10.0),
            ("Answer", 40.0),
            ("Explanation", 50.0),
        ];
        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }

        let title_format = Format::new()
            .set_font_size(14)
            .set_bold()
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        let title = format!(
            "{} - Class {} {} ({})",
            paper.meta.school_name,
            paper.meta.class_name,
            paper.meta.subject,
            paper.created_at.format("%d-%m-%Y")
        );
        worksheet.set_row_height(0, 30)?;
        worksheet.merge_range(0, 0, 0, (columns.len() - 1) as u16, &title, &title_format)?;

        let header_format = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(1, i as u16, *name, &header_format)?;
        }

        let cell = Format::new()
            .set_text_wrap()
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        for (idx, q) in paper.questions.iter().enumerate() {
            let row = 2 + idx as u32;
            let number = q.number.unwrap_or(idx + 1) as f64;
            worksheet.write_number_with_format(row, 0, number, &cell)?;
            worksheet.write_string_with_format(row, 1, q.kind.as_str(), &cell)?;
            worksheet.write_string_with_format(row, 2, &q.text, &cell)?;
            worksheet.write_number_with_format(row, 3, q.marks as f64, &cell)?;
            worksheet.write_string_with_format(row, 4, q.answer.as_deref().unwrap_or(NO_ANSWER), &cell)?;
            worksheet.write_string_with_format(row, 5, q.explanation.as_deref().unwrap_or(""), &cell)?;
        }

        Ok(workbook.save_to_buffer()?)
    }

    pub async fn paper(&self, paper: &ComposedPaper, format: DocumentFormat) -> Result<Export> {
        let bytes = self
            .renderer
            .render(&Self::paper_document(paper), format)
            .await?;
        Ok(Export {
            bytes,
            content_type: format.content_type(),
            filename: format!("{}.{}", paper.paper_id, format.extension()),
        })
    }

    pub async fn answer_key(&self, paper: &ComposedPaper, format: AnswerKeyFormat) -> Result<Export> {
        let filename = |ext: &str| format!("{}_answer_key.{}", paper.paper_id, ext);
        match format {
            AnswerKeyFormat::Txt => Ok(Export {
                bytes: Self::answer_key_text(paper).into_bytes(),
                content_type: "text/plain; charset=utf-8",
                filename: filename("txt"),
            }),
            AnswerKeyFormat::Pdf => Ok(Export {
                bytes: self
                    .renderer
                    .render(&Self::answer_key_document(paper), DocumentFormat::Pdf)
                    .await?,
                content_type: DocumentFormat::Pdf.content_type(),
                filename: filename("pdf"),
            }),
            AnswerKeyFormat::Xlsx => Ok(Export {
                bytes: Self::answer_key_xlsx(paper)?,
                content_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                filename: filename("xlsx"),
            }),
        }
    }
}
