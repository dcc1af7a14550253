//! 特征向量的持久化编码
//!
//! 编码格式为 JSON 浮点数组，例如 `[0.0,0.25,0.75]`。数组本身携带长度，
//! 解码时不假定任何固定维数。该格式会写入数据库，修改前必须提供迁移方案。

use crate::error::Result;
use crate::histogram::FeatureVector;

/// 将特征向量编码为字符串
pub fn encode(v: &FeatureVector) -> String {
    // Vec<f32> 的序列化不会失败
    serde_json::to_string(v.as_slice()).unwrap_or_else(|_| String::from("[]"))
}

/// 从字符串解码特征向量，格式错误时返回 [`LabelError::Codec`](crate::LabelError::Codec)
pub fn decode(s: &str) -> Result<FeatureVector> {
    let v: Vec<f32> = serde_json::from_str(s)?;
    Ok(FeatureVector::from(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LabelError;

    #[test]
    fn test_round_trip() {
        let v = FeatureVector::from(vec![0.0, 0.1, 1.0 / 3.0, 0.5669, 1e-7]);
        let decoded = decode(&encode(&v)).unwrap();
        assert_eq!(decoded.len(), v.len());
        for (a, b) in decoded.as_slice().iter().zip(v.as_slice()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_format() {
        let v = FeatureVector::from(vec![0.0, 0.5, 0.25]);
        assert_eq!(encode(&v), "[0.0,0.5,0.25]");
    }

    #[test]
    fn test_legacy_array() {
        // 旧版本写入的整数形式同样可以解析
        let v = decode("[0, 1, 0.5]").unwrap();
        assert_eq!(v.as_slice(), &[0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_arbitrary_length() {
        assert_eq!(decode("[]").unwrap().len(), 0);
        assert_eq!(decode(&encode(&FeatureVector::from(vec![0.1; 512]))).unwrap().len(), 512);
    }

    #[test]
    fn test_invalid() {
        for s in ["", "not json", "{\"a\":1}", "[1, \"x\"]", "[1, 2"] {
            assert!(matches!(decode(s), Err(LabelError::Codec(_))), "{s}");
        }
    }
}
