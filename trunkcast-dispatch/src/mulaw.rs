//! G.711 mu-law companding of 16-bit linear PCM.

const CLIP: i32 = 0x1FFF;
const BIAS: i32 = 33;
const SIGN_BIT: u8 = 0x80;

/// Encode one 16-bit linear sample as a mu-law byte
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let sign = if sample < 0 { SIGN_BIT } else { 0 };

    // i32 so that i16::MIN has a magnitude
    let magnitude = ((sample as i32).abs() >> 2).min(CLIP) + BIAS;

    let (exponent, mantissa) = if magnitude > CLIP {
        (7u8, 0x0Fu8)
    } else {
        // magnitude >= BIAS, so the top bit is somewhere in 5..=12
        let top_bit = 31 - (magnitude as u32).leading_zeros();
        let exponent = (top_bit - 5) as u8;
        let mantissa = ((magnitude >> (exponent + 1)) & 0x0F) as u8;
        (exponent, mantissa)
    };

    !(sign | (exponent << 4) | mantissa)
}

/// Encode a buffer of samples
pub fn encode_samples(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| linear_to_mulaw(s)).collect()
}

/// Encode raw little-endian PCM. A trailing odd byte is dropped.
pub fn encode_pcm16le(pcm: &[u8]) -> Vec<u8> {
    pcm.chunks_exact(2)
        .map(|pair| linear_to_mulaw(i16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_ff() {
        assert_eq!(linear_to_mulaw(0), 0xFF);
    }

    #[test]
    fn test_reference_values() {
        assert_eq!(linear_to_mulaw(-1), 0x7F);
        assert_eq!(linear_to_mulaw(1000), 0xCE);
        assert_eq!(linear_to_mulaw(-1000), 0x4E);
        assert_eq!(linear_to_mulaw(i16::MAX), 0x80);
        assert_eq!(linear_to_mulaw(i16::MIN), 0x00);
    }

    #[test]
    fn test_monotonic_over_positive_range() {
        // Larger magnitude never yields a "larger" (quieter) code
        let mut last = linear_to_mulaw(0);
        for sample in (0..=i16::MAX).step_by(97) {
            let code = linear_to_mulaw(sample);
            assert!(code <= last, "sample {sample} -> {code:#04x} after {last:#04x}");
            last = code;
        }
    }

    #[test]
    fn test_deterministic() {
        let samples: Vec<i16> = (-4000..4000).step_by(7).collect();
        assert_eq!(encode_samples(&samples), encode_samples(&samples));
    }

    #[test]
    fn test_odd_length_drops_last_byte() {
        let pcm = [0x00, 0x00, 0xE8, 0x03, 0x7F];
        assert_eq!(encode_pcm16le(&pcm), vec![0xFF, 0xCE]);
        assert!(encode_pcm16le(&[0x12]).is_empty());
    }

    #[test]
    fn test_pcm_matches_samples() {
        let samples = [0i16, 1000, -1000, 12345];
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(encode_pcm16le(&pcm), encode_samples(&samples));
    }
}
