//! Instruction prompts for the vision recognition call.
//!
//! Centralising the prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tightening a transcription rule requires
//!    editing exactly one place.
//!
//! 2. **Testability** — unit tests can assert invariants of the prompt (the
//!    marker tag, the math delimiters) without calling a real model.
//!
//! Callers can override via [`crate::config::ScanConfig::recognition_prompt`];
//! the constant here is used only when no override is provided.

/// Default instruction for transcribing a math exam image.
///
/// The transcript is aimed at being pasted into Word, so the prompt demands
/// `${ … }$` math delimiters (which MathType-style converters pick up) and
/// forbids constructs Word's equation import mangles. Figures, graphs, and
/// variation tables the model cannot transcribe must be marked with the
/// literal [`FIGURE_MARKER`](crate::pipeline::scanner::FIGURE_MARKER) tag so the user can crop them in afterwards.
pub const DEFAULT_RECOGNITION_PROMPT: &str = r#"Bạn là công cụ OCR chuyên nghiệp chuyển đổi đề thi Toán sang văn bản Word chuẩn nhất.

NHIỆM VỤ:
1. Chuyển đổi toàn bộ nội dung ảnh sang text.

2. XỬ LÝ CÔNG THỨC TOÁN (LaTeX):
   - Bắt buộc đặt trong: ${ công thức }$
   - Ví dụ: ${ x^2 + 1 = 0 }$
   - TUYỆT ĐỐI KHÔNG dùng dấu backtick (`) bao quanh ${ và }$.

   QUY TẮC ĐẶC BIỆT CHO WORD (BẮT BUỘC TUÂN THỦ):

   A. MAX, MIN, LIM:
     - TUYỆT ĐỐI KHÔNG DÙNG: \max_{...}, \min_{...}, \lim_{...}
     - BẮT BUỘC DÙNG cấu trúc \underset...{\mathop...}:
       + Max: ${ \underset{[a;b]}{\mathop{\max }}\, y }$
       + Min: ${ \underset{[a;b]}{\mathop{\min }}\, y }$
       + Lim: ${ \underset{x \to +\infty}{\mathop{\lim }}\, f(x) }$

   B. TÍCH PHÂN (INTEGRAL):
     - BẮT BUỘC thêm \limits sau \int để cận nằm chính xác trên/dưới.
     - Ví dụ ĐÚNG: ${ \int\limits_{0}^{1}{x dx} }$

   C. DẤU NGOẶC (BRACKETS):
     - BẮT BUỘC dùng \left và \right để ngoặc tự co giãn theo nội dung.
     - Ví dụ: ${ \left( \frac{x+1}{x-1} \right) }$
     - Áp dụng cho cả ngoặc tròn (), ngoặc vuông [], ngoặc nhọn {}.

   D. KÝ HIỆU ĐỘ (DEGREE):
     - Viết trực tiếp \circ sau số, KHÔNG dùng mũ ^.
     - Ví dụ ĐÚNG: ${ 45\circ }$

   E. TÊN HÌNH HỌC:
     - Các ký hiệu tên hình như S.ABCD, A'B'C', (SAB)... phải được coi là
       công thức toán. Ví dụ: ${ S.ABCD }$, ${ (SAB) }$.

3. XỬ LÝ HÌNH VẼ, ĐỒ THỊ, BẢNG BIẾN THIÊN:
   - Khi gặp hình vẽ, đồ thị hoặc bảng biến thiên (thông tin dạng hình ảnh
     không thể chuyển thành text), hãy chèn tag sau vào đúng vị trí đó:
     [[CHÈN_HÌNH]]
   - Không cần mô tả hình, chỉ cần đặt tag để người dùng chèn ảnh vào sau.

4. ĐỊNH DẠNG:
   - Giữ nguyên cấu trúc Câu 1, Câu 2...
   - TUYỆT ĐỐI KHÔNG dùng định dạng in đậm Markdown (**) cho "Câu 1",
     "Câu 2"... Chỉ viết text thường.
   - Các đáp án trắc nghiệm A, B, C, D nên xuống dòng."#;
