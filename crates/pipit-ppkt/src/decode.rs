use crate::wire::Dtype;

/// Converts a raw payload into f32 samples, appending to `out`.
/// Returns the number of samples produced.
///
/// Pure function of `(bytes, dtype)`: integers and f64 convert
/// numerically, complex payloads reduce to magnitude. A trailing
/// partial sample (malformed payload) is ignored; header validation
/// rejects such datagrams before they get here.
pub fn decode_to_f32(dtype: Dtype, payload: &[u8], out: &mut Vec<f32>) -> usize {
    let before = out.len();
    match dtype {
        Dtype::I8 => {
            out.extend(payload.iter().map(|&b| f32::from(b as i8)));
        }
        Dtype::I16 => {
            out.extend(
                payload
                    .chunks_exact(2)
                    .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]]))),
            );
        }
        Dtype::I32 => {
            out.extend(
                payload
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes(c.try_into().unwrap()) as f32),
            );
        }
        Dtype::F32 => {
            out.extend(
                payload
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes(c.try_into().unwrap())),
            );
        }
        Dtype::F64 => {
            out.extend(
                payload
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes(c.try_into().unwrap()) as f32),
            );
        }
        Dtype::Cf32 => {
            out.extend(payload.chunks_exact(8).map(|c| {
                let re = f32::from_le_bytes(c[0..4].try_into().unwrap());
                let im = f32::from_le_bytes(c[4..8].try_into().unwrap());
                (re * re + im * im).sqrt()
            }));
        }
        Dtype::Cf64 => {
            out.extend(payload.chunks_exact(16).map(|c| {
                let re = f64::from_le_bytes(c[0..8].try_into().unwrap());
                let im = f64::from_le_bytes(c[8..16].try_into().unwrap());
                (re * re + im * im).sqrt() as f32
            }));
        }
    }
    out.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_identity() {
        let payload: Vec<u8> = [1.5f32, -2.5].iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut out = Vec::new();
        assert_eq!(decode_to_f32(Dtype::F32, &payload, &mut out), 2);
        assert_eq!(out, vec![1.5, -2.5]);
    }

    #[test]
    fn test_i16_widens() {
        let payload: Vec<u8> = [-300i16, 1000].iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut out = Vec::new();
        decode_to_f32(Dtype::I16, &payload, &mut out);
        assert_eq!(out, vec![-300.0, 1000.0]);
    }

    #[test]
    fn test_i8_widens() {
        let payload = [0xffu8, 0x7f]; // -1, 127
        let mut out = Vec::new();
        decode_to_f32(Dtype::I8, &payload, &mut out);
        assert_eq!(out, vec![-1.0, 127.0]);
    }

    #[test]
    fn test_cf32_magnitude() {
        let payload: Vec<u8> = [3.0f32, 4.0, 0.0, -2.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut out = Vec::new();
        assert_eq!(decode_to_f32(Dtype::Cf32, &payload, &mut out), 2);
        assert_eq!(out, vec![5.0, 2.0]);
    }

    #[test]
    fn test_f64_narrows() {
        let payload: Vec<u8> = [0.25f64].iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut out = Vec::new();
        decode_to_f32(Dtype::F64, &payload, &mut out);
        assert_eq!(out, vec![0.25]);
    }

    #[test]
    fn test_appends_to_existing() {
        let mut out = vec![9.0f32];
        decode_to_f32(Dtype::I8, &[1u8], &mut out);
        assert_eq!(out, vec![9.0, 1.0]);
    }
}
