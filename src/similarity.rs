/// 计算两个向量的余弦相似度
///
/// 长度不一致或任一向量为零向量时返回 0，中间结果使用 f64 计算。
/// 直方图分量非负，因此结果落在 `[0, 1]`。
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    // 浮点误差可能略微越界
    (dot / denominator).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        let v = [0.2, 0.3, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scaled() {
        let s = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
    }

    #[test]
    fn test_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // (0.5, 0.5) 与 (1, 0)：cos = 0.5 / (sqrt(0.5) * 1)
        let s = cosine_similarity(&[0.5, 0.5], &[1.0, 0.0]);
        assert!((s - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }
}
