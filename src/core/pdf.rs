//! Minimal PDF assembly for scanned pages
//!
//! Pages arrive from the scanner as JPEG. They are embedded unchanged
//! (`/DCTDecode`), one image per page, with the page size derived from the
//! pixel dimensions and the scan resolution.

use crate::core::error::{Result, ScanError};
use crate::device::traits::ScannedPage;
use image::{ColorType, ImageDecoder, ImageReader};
use std::io::{Cursor, Write};

/// Points per inch in PDF user space
const POINTS_PER_INCH: f64 = 72.0;

/// Header facts about one JPEG page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
}

/// Read dimensions and color space from JPEG data without decoding pixels
pub fn inspect_jpeg(data: &[u8]) -> Result<JpegInfo> {
    let reader = ImageReader::with_format(Cursor::new(data), image::ImageFormat::Jpeg);
    let decoder = reader.into_decoder()?;
    let (width, height) = decoder.dimensions();
    let grayscale = matches!(
        decoder.color_type(),
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16
    );

    Ok(JpegInfo {
        width,
        height,
        grayscale,
    })
}

/// Tracks object offsets while the document is written
struct PdfWriter {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new(object_count: usize) -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            out,
            offsets: vec![0; object_count + 1],
        }
    }

    fn begin_object(&mut self, id: usize) {
        self.offsets[id] = self.out.len();
        self.write_str(&format!("{} 0 obj\n", id));
    }

    fn end_object(&mut self) {
        self.write_str("endobj\n");
    }

    fn dictionary_object(&mut self, id: usize, body: &str) {
        self.begin_object(id);
        self.write_str(body);
        self.write_str("\n");
        self.end_object();
    }

    fn stream_object(&mut self, id: usize, dictionary: &str, data: &[u8]) {
        self.begin_object(id);
        self.write_str(&format!("<< {} /Length {} >>\nstream\n", dictionary, data.len()));
        self.out.extend_from_slice(data);
        self.write_str("\nendstream\n");
        self.end_object();
    }

    fn write_str(&mut self, text: &str) {
        self.out.extend_from_slice(text.as_bytes());
    }

    fn finish(mut self, root: usize) -> Vec<u8> {
        let xref_offset = self.out.len();
        let size = self.offsets.len();

        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", size);
        for offset in &self.offsets[1..] {
            xref.push_str(&format!("{:010} 00000 n \n", offset));
        }
        self.write_str(&xref);
        self.write_str(&format!(
            "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, root, xref_offset
        ));

        self.out
    }
}

fn points(pixels: u32, resolution: u32) -> f64 {
    pixels as f64 * POINTS_PER_INCH / resolution.max(1) as f64
}

/// Build a PDF document with one page per scanned JPEG
pub fn assemble_pdf(pages: &[ScannedPage], resolution: u32) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(ScanError::Protocol("no pages to assemble".to_string()));
    }

    // 1: catalog, 2: page tree, then page/content/image per page
    let object_count = 2 + pages.len() * 3;
    let mut pdf = PdfWriter::new(object_count);

    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 3 + i * 3))
        .collect();

    pdf.dictionary_object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    pdf.dictionary_object(
        2,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
    );

    for (i, page) in pages.iter().enumerate() {
        let info = inspect_jpeg(&page.data)?;
        let page_id = 3 + i * 3;
        let content_id = page_id + 1;
        let image_id = page_id + 2;

        let width = points(info.width, resolution);
        let height = points(info.height, resolution);

        pdf.dictionary_object(
            page_id,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Resources << /XObject << /Im0 {} 0 R >> >> /Contents {} 0 R >>",
                width, height, image_id, content_id
            ),
        );

        let mut content = Vec::new();
        write!(content, "q\n{:.2} 0 0 {:.2} 0 0 cm\n/Im0 Do\nQ\n", width, height)?;
        pdf.stream_object(content_id, "", &content);

        let color_space = if info.grayscale {
            "/DeviceGray"
        } else {
            "/DeviceRGB"
        };
        pdf.stream_object(
            image_id,
            &format!(
                "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} \
                 /BitsPerComponent 8 /Filter /DCTDecode",
                info.width, info.height, color_space
            ),
            &page.data,
        );
    }

    Ok(pdf.finish(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdb::synthetic_page;

    fn page(index: usize, width: u32, height: u32) -> ScannedPage {
        ScannedPage {
            index,
            data: synthetic_page(width, height, index as u64).unwrap(),
        }
    }

    #[test]
    fn test_inspect_jpeg() {
        let data = synthetic_page(40, 30, 1).unwrap();
        let info = inspect_jpeg(&data).unwrap();
        assert_eq!(info.width, 40);
        assert_eq!(info.height, 30);
        assert!(!info.grayscale);
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        assert!(inspect_jpeg(b"not a jpeg").is_err());
    }

    #[test]
    fn test_assemble_two_pages() {
        let pages = vec![page(1, 200, 300), page(2, 200, 300)];
        let pdf = assemble_pdf(&pages, 100).unwrap();
        let text = String::from_utf8_lossy(&pdf);

        assert!(pdf.starts_with(b"%PDF-1.4"));
        assert!(text.contains("/Count 2"));
        assert!(text.contains("/Kids [3 0 R 6 0 R]"));
        // 200 px at 100 dpi = 2 inches = 144 points
        assert!(text.contains("/MediaBox [0 0 144.00 216.00]"));
        assert!(text.contains("/Filter /DCTDecode"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let pages = vec![page(1, 50, 50)];
        let pdf = assemble_pdf(&pages, 300).unwrap();
        let text = String::from_utf8_lossy(&pdf).into_owned();

        let startxref = text.rfind("startxref\n").unwrap();
        let xref_offset: usize = text[startxref + 10..]
            .lines()
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!(pdf[xref_offset..].starts_with(b"xref"));

        let table = String::from_utf8_lossy(&pdf[xref_offset..]).into_owned();
        let entries: Vec<&str> = table.lines().skip(3).take(5).collect();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            let offset: usize = entry[..10].parse().unwrap();
            let expected = format!("{} 0 obj", i + 1);
            assert!(pdf[offset..].starts_with(expected.as_bytes()));
        }
    }

    #[test]
    fn test_assemble_empty_is_error() {
        assert!(assemble_pdf(&[], 300).is_err());
    }
}
