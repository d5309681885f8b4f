// src/services/pdf.rs
//
// In-process PDF renderer. Writes PDF 1.4 by hand with the standard Type1
// fonts so no timestamps or random document ids end up in the file.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    errors::{PayrollError, PayrollResult},
    models::{Bulletin, ElementKind, Money, PaymentMethod, PayrollElement},
    services::render::{DocumentRenderer, check_renderable},
};

pub const TEMPLATE_VERSION: &str = "bulletin-pdf/1";

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const LEFT: f32 = 50.0;
const RIGHT: f32 = 545.0;
const TOP: f32 = 790.0;
const BOTTOM: f32 = 60.0;

// Right edges of the element table columns.
const COL_BASE: f32 = 300.0;
const COL_RATE: f32 = 360.0;
const COL_GAIN: f32 = 455.0;
const COL_WITHHELD: f32 = RIGHT;

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous rendering; the async trait method runs this on the
    /// blocking pool.
    pub fn render_document(&self, bulletin: &Bulletin) -> PayrollResult<Vec<u8>> {
        check_renderable(bulletin)?;
        let pages = layout(bulletin);
        let title = format!(
            "Bulletin de paie {} {}",
            bulletin.employee.full_name(),
            bulletin.period
        );
        Ok(write_pdf(&pages, &title))
    }
}

#[async_trait]
impl DocumentRenderer for PdfRenderer {
    fn template_version(&self) -> &str {
        TEMPLATE_VERSION
    }

    async fn render(&self, bulletin: &Bulletin) -> PayrollResult<Vec<u8>> {
        let renderer = *self;
        let bulletin_id = bulletin.id;
        let owned = bulletin.clone();
        tokio::task::spawn_blocking(move || renderer.render_document(&owned))
            .await
            .map_err(|e| PayrollError::RenderError {
                bulletin_id,
                reason: format!("render task failed: {e}"),
            })?
    }
}

// ─── Layout ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
    Mono,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Mono => "F3",
        }
    }
}

/// Accumulates content streams, starting a new page when the cursor runs
/// into the bottom margin.
struct Canvas {
    pages: Vec<Vec<u8>>,
    current: Vec<u8>,
    y: f32,
}

impl Canvas {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: TOP,
        }
    }

    fn line_break(&mut self, height: f32) {
        self.y -= height;
        if self.y < BOTTOM {
            self.pages.push(std::mem::take(&mut self.current));
            self.y = TOP;
        }
    }

    fn text(&mut self, x: f32, font: Font, size: u32, text: &str) {
        self.current.extend_from_slice(
            format!("BT /{} {} Tf {:.2} {:.2} Td (", font.resource(), size, x, self.y).as_bytes(),
        );
        self.current.extend_from_slice(&encode_text(text));
        self.current.extend_from_slice(b") Tj ET\n");
    }

    /// Courier is fixed-pitch (600/1000 em), so right alignment is exact.
    fn amount(&mut self, right_edge: f32, size: u32, text: &str) {
        let width = text.chars().count() as f32 * size as f32 * 0.6;
        self.text(right_edge - width, Font::Mono, size, text);
    }

    fn rule(&mut self) {
        self.current.extend_from_slice(
            format!(
                "0.5 w {:.2} {:.2} m {:.2} {:.2} l S\n",
                LEFT,
                self.y + 4.0,
                RIGHT,
                self.y + 4.0
            )
            .as_bytes(),
        );
        self.line_break(10.0);
    }

    fn finish(mut self) -> Vec<Vec<u8>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

fn layout(b: &Bulletin) -> Vec<Vec<u8>> {
    let mut c = Canvas::new();
    let company = &b.company;
    let employee = &b.employee;

    c.text(LEFT, Font::Bold, 14, &company.name);
    c.line_break(16.0);
    c.text(LEFT, Font::Regular, 9, &format!("{}, {}", company.address, company.city));
    c.line_break(12.0);
    c.text(LEFT, Font::Regular, 9, &format!("ICE : {}", company.ice));
    if let Some(affiliation) = &company.cnss_affiliation {
        c.text(300.0, Font::Regular, 9, &format!("Affiliation CNSS : {affiliation}"));
    }
    c.line_break(26.0);

    c.text(LEFT, Font::Bold, 16, "BULLETIN DE PAIE");
    c.text(400.0, Font::Bold, 11, &format!("Période : {}", b.period));
    c.line_break(22.0);
    c.rule();

    let identity = [
        format!("Salarié : {}", employee.full_name()),
        format!("Matricule : {}", employee.id),
        format!("CIN : {}", employee.national_id),
        format!(
            "N° CNSS : {}",
            employee.cnss_number.as_deref().unwrap_or("-")
        ),
        format!("Fonction : {} - {}", employee.position, employee.department),
        format!("Date d'embauche : {}", employee.hire_date),
        payment_line(b),
    ];
    for line in &identity {
        c.text(LEFT, Font::Regular, 9, line);
        c.line_break(12.0);
    }
    c.line_break(6.0);
    c.rule();

    c.text(LEFT, Font::Bold, 9, "Libellé");
    c.text(COL_BASE - 30.0, Font::Bold, 9, "Base");
    c.text(COL_RATE - 30.0, Font::Bold, 9, "Taux");
    c.text(COL_GAIN - 35.0, Font::Bold, 9, "Gains");
    c.text(COL_WITHHELD - 45.0, Font::Bold, 9, "Retenues");
    c.line_break(14.0);

    for element in &b.elements {
        element_row(&mut c, element);
    }
    c.line_break(4.0);
    c.rule();

    total_row(&mut c, "Salaire brut", COL_GAIN, b.gross_total);
    total_row(&mut c, "Salaire brut imposable", COL_GAIN, b.taxable_total);
    total_row(&mut c, "Net imposable", COL_GAIN, b.contributions.net_taxable);
    total_row(
        &mut c,
        "Total retenues",
        COL_WITHHELD,
        b.contributions.employee_side().magnitude() + b.post_tax_deductions.magnitude(),
    );
    c.line_break(4.0);
    c.text(LEFT, Font::Bold, 12, "NET À PAYER");
    c.amount(RIGHT, 12, &format!("{} MAD", b.net_total));
    c.line_break(20.0);
    c.rule();

    let k = &b.contributions;
    c.text(LEFT, Font::Bold, 9, "Charges patronales");
    c.line_break(13.0);
    total_row(&mut c, "CNSS", COL_WITHHELD, k.cnss_employer);
    total_row(&mut c, "Allocations familiales", COL_WITHHELD, k.family_allowance);
    total_row(&mut c, "Taxe de formation professionnelle", COL_WITHHELD, k.training_tax);
    total_row(&mut c, "AMO", COL_WITHHELD, k.amo_employer);
    if let Some(cimr) = k.cimr_employer {
        total_row(&mut c, "CIMR", COL_WITHHELD, cimr);
    }
    total_row(&mut c, "Total charges patronales", COL_WITHHELD, k.employer_side());

    if let Some(ytd) = &b.year_to_date {
        c.line_break(6.0);
        c.text(
            LEFT,
            Font::Bold,
            9,
            &format!("Cumuls {} ({} mois)", b.period.year(), ytd.months),
        );
        c.line_break(13.0);
        total_row(&mut c, "Brut", COL_WITHHELD, ytd.gross);
        total_row(&mut c, "Imposable", COL_WITHHELD, ytd.taxable);
        total_row(&mut c, "IR", COL_WITHHELD, ytd.income_tax);
        total_row(&mut c, "Net", COL_WITHHELD, ytd.net);
    }

    c.line_break(14.0);
    c.text(
        LEFT,
        Font::Regular,
        7,
        &format!(
            "Réf. {}_{} - modèle {} - barème {}",
            employee.id, b.period, TEMPLATE_VERSION, k.rule_version
        ),
    );

    c.finish()
}

fn payment_line(b: &Bulletin) -> String {
    let method = match b.payment.method {
        PaymentMethod::BankTransfer => "Virement bancaire",
        PaymentMethod::Cheque => "Chèque",
        PaymentMethod::Cash => "Espèces",
    };
    let mut line = format!("Paiement : {method}");
    if let Some(bank) = &b.payment.bank_name {
        line.push_str(&format!(" - {bank}"));
    }
    if let Some(rib) = &b.payment.rib {
        line.push_str(&format!(" - RIB {rib}"));
    }
    line
}

fn element_row(c: &mut Canvas, element: &PayrollElement) {
    c.text(LEFT, Font::Regular, 9, &element.label);
    if let Some(base) = element.base {
        c.amount(COL_BASE, 9, &format!("{base:.2}"));
    }
    if let Some(rate) = element.rate {
        c.amount(COL_RATE, 9, &format_rate(rate));
    }
    let column = match element.kind {
        ElementKind::Deduction | ElementKind::Contribution => COL_WITHHELD,
        _ => COL_GAIN,
    };
    c.amount(column, 9, &element.amount.to_string());
    c.line_break(12.0);
}

fn total_row(c: &mut Canvas, label: &str, column: f32, amount: Money) {
    c.text(LEFT, Font::Regular, 9, label);
    c.amount(column, 9, &amount.to_string());
    c.line_break(12.0);
}

fn format_rate(rate: Decimal) -> String {
    format!("{}%", rate.normalize())
}

/// PDF literal string bytes in WinAnsi. Characters outside Latin-1 become `?`.
fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(ch as u8);
            }
            ' '..='~' => out.push(ch as u8),
            '\u{a0}'..='\u{ff}' => out.push(ch as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

// ─── File structure ───────────────────────────────────────────────────────────

struct PdfWriter {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            out,
            offsets: Vec::new(),
        }
    }

    /// Appends the next object; objects are numbered in write order from 1.
    fn object(&mut self, body: &[u8]) {
        self.offsets.push(self.out.len());
        let number = self.offsets.len();
        self.out
            .extend_from_slice(format!("{number} 0 obj\n").as_bytes());
        self.out.extend_from_slice(body);
        self.out.extend_from_slice(b"\nendobj\n");
    }

    fn finish(mut self, root: usize, info: usize) -> Vec<u8> {
        let xref_at = self.out.len();
        let size = self.offsets.len() + 1;
        self.out
            .extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
        for offset in &self.offsets {
            self.out
                .extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        self.out.extend_from_slice(
            format!(
                "trailer\n<< /Size {size} /Root {root} 0 R /Info {info} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
            )
            .as_bytes(),
        );
        self.out
    }
}

fn write_pdf(pages: &[Vec<u8>], title: &str) -> Vec<u8> {
    // 1 catalog, 2 page tree, 3..=5 fonts, 6 info, then (page, content) pairs.
    const FIRST_PAGE: usize = 7;
    let page_ref = |i: usize| FIRST_PAGE + 2 * i;

    let mut pdf = PdfWriter::new();
    pdf.object(b"<< /Type /Catalog /Pages 2 0 R >>");

    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", page_ref(i))).collect();
    pdf.object(
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        )
        .as_bytes(),
    );

    for base_font in ["Helvetica", "Helvetica-Bold", "Courier"] {
        pdf.object(
            format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{base_font} /Encoding /WinAnsiEncoding >>"
            )
            .as_bytes(),
        );
    }

    let mut info = b"<< /Title (".to_vec();
    info.extend_from_slice(&encode_text(title));
    info.extend_from_slice(format!(") /Producer (payroll-ma {TEMPLATE_VERSION}) >>").as_bytes());
    pdf.object(&info);

    for (i, content) in pages.iter().enumerate() {
        pdf.object(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R /F3 5 0 R >> >> /Contents {} 0 R >>",
                page_ref(i) + 1
            )
            .as_bytes(),
        );
        let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
        stream.extend_from_slice(content);
        stream.extend_from_slice(b"\nendstream");
        pdf.object(&stream);
    }

    pdf.finish(1, 6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeductionAmount, DeductionTiming};
    use crate::services::fixtures;
    use rust_decimal_macros::dec;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn produces_a_well_formed_pdf() {
        let bytes = PdfRenderer::new()
            .render_document(&fixtures::bulletin(&[]))
            .unwrap();

        assert!(bytes.starts_with(b"%PDF-1.4\n"));
        assert!(bytes.ends_with(b"%%EOF\n"));

        let text = String::from_utf8_lossy(&bytes);
        let startxref = text.rfind("startxref\n").unwrap() + "startxref\n".len();
        let offset: usize = text[startxref..].lines().next().unwrap().parse().unwrap();
        assert_eq!(&bytes[offset..offset + 4], b"xref");
    }

    #[test]
    fn shows_net_pay_and_reference() {
        let bulletin = fixtures::bulletin(&[]);
        let bytes = PdfRenderer::new().render_document(&bulletin).unwrap();

        assert!(contains(&bytes, b"5579.37 MAD"));
        assert!(contains(&bytes, b"PAYER"));
        let reference = format!("{}_{}", bulletin.employee.id, bulletin.period);
        assert!(contains(&bytes, reference.as_bytes()));
    }

    #[test]
    fn identical_bulletins_give_identical_bytes() {
        let renderer = PdfRenderer::new();
        let a = renderer.render_document(&fixtures::bulletin(&[])).unwrap();
        let b = renderer.render_document(&fixtures::bulletin(&[])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn long_bulletins_flow_onto_more_pages() {
        let many: Vec<_> = (0..60)
            .map(|i| {
                PayrollElement::deduction(
                    format!("Retenue diverse {i}"),
                    DeductionAmount::new(Money::new(dec!(1)).unwrap()),
                    DeductionTiming::PostTax,
                )
            })
            .collect();
        let bytes = PdfRenderer::new()
            .render_document(&fixtures::bulletin(&many))
            .unwrap();
        assert!(contains(&bytes, b"/Count 2"));
    }

    #[test]
    fn refuses_bulletin_without_cnss_number() {
        let mut bulletin = fixtures::bulletin(&[]);
        bulletin.employee.cnss_number = None;
        let err = PdfRenderer::new().render_document(&bulletin).unwrap_err();
        assert!(matches!(err, PayrollError::RenderError { .. }));
    }

    #[test]
    fn escapes_parentheses_and_encodes_latin1() {
        assert_eq!(encode_text("a(b)\\"), b"a\\(b\\)\\\\".to_vec());
        assert_eq!(encode_text("é"), vec![0xE9]);
        assert_eq!(encode_text("€"), b"?".to_vec());
    }

    #[tokio::test]
    async fn async_render_matches_sync_render() {
        let bulletin = fixtures::bulletin(&[]);
        let renderer = PdfRenderer::new();
        let via_trait = renderer.render(&bulletin).await.unwrap();
        assert_eq!(via_trait, renderer.render_document(&bulletin).unwrap());
        assert_eq!(renderer.template_version(), TEMPLATE_VERSION);
    }
}
