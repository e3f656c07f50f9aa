// THEORY:
// The `ColorKey` is the most fundamental unit of the tally. It is a "dumb" identity
// for one exact color: three 8-bit channels packed into the low 24 bits of a `u32`
// (`R << 16 | G << 8 | B`). Alpha is dropped on the floor, and two keys are equal
// only when every channel bit matches. There is no quantization anywhere.
//
// Decoded images do not always arrive at 8 bits per channel. A 16-bit PNG carries
// twice the precision we report, so wider channels are shifted right by the excess
// bits before packing. That keeps the top byte of each channel, which is what a
// `#rrggbb` string can express.

pub mod pixel {
    use std::fmt;

    pub type Channel = u8;
    pub type Packed = u32;

    /// Bits per channel in a packed key.
    pub const KEY_CHANNEL_BITS: u32 = 8;

    /// A packed 24-bit RGB color used as the histogram key.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ColorKey(Packed);

    impl ColorKey {
        pub fn from_rgb(red: Channel, green: Channel, blue: Channel) -> Self {
            ColorKey((red as Packed) << 16 | (green as Packed) << 8 | blue as Packed)
        }

        /// Packs channels stored at `bits` per channel, keeping the top 8 bits of each.
        ///
        /// `bits` below 8 are treated as 8; callers only ever hand us 8 or 16.
        pub fn from_wide(red: u32, green: u32, blue: u32, bits: u32) -> Self {
            let shift = bits.saturating_sub(KEY_CHANNEL_BITS);
            Self::from_rgb(
                (red >> shift) as Channel,
                (green >> shift) as Channel,
                (blue >> shift) as Channel,
            )
        }

        pub fn red(&self) -> Channel {
            (self.0 >> 16) as Channel
        }

        pub fn green(&self) -> Channel {
            (self.0 >> 8) as Channel
        }

        pub fn blue(&self) -> Channel {
            self.0 as Channel
        }

        pub fn packed(&self) -> Packed {
            self.0
        }
    }

    impl From<image::Rgba<u8>> for ColorKey {
        fn from(pixel: image::Rgba<u8>) -> Self {
            let [red, green, blue, _alpha] = pixel.0;
            ColorKey::from_rgb(red, green, blue)
        }
    }

    /// Formats as `#rrggbb`, lowercase and zero padded.
    impl fmt::Display for ColorKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "#{:06x}", self.0)
        }
    }
}
