//! Character customization data

/// Number of bytes in a customization array
pub const CUSTOMIZE_SIZE: usize = 26;

/// Raw customization bytes (race, gender, height, face, ...)
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CustomizeArray {
    pub data: [u8; CUSTOMIZE_SIZE],
}

/// Named positions within a [`CustomizeArray`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomizeIndex {
    Race = 0,
    Gender = 1,
    BodyType = 2,
    Height = 3,
    Clan = 4,
    Face = 5,
    Hairstyle = 6,
    Highlights = 7,
    SkinColor = 8,
    EyeColorRight = 9,
    HairColor = 10,
    HighlightsColor = 11,
    FacialFeature = 12,
    TattooColor = 13,
    Eyebrows = 14,
    EyeColorLeft = 15,
    EyeShape = 16,
    Nose = 17,
    Jaw = 18,
    Mouth = 19,
    LipColor = 20,
    MuscleMass = 21,
    TailShape = 22,
    BustSize = 23,
    FacePaint = 24,
    FacePaintColor = 25,
}

impl CustomizeArray {
    /// Read a single customization value
    #[inline]
    pub fn get(&self, index: CustomizeIndex) -> u8 {
        self.data[index as usize]
    }

    /// Write a single customization value
    #[inline]
    pub fn set(&mut self, index: CustomizeIndex, value: u8) {
        self.data[index as usize] = value;
    }
}

impl Default for CustomizeArray {
    fn default() -> Self {
        Self {
            data: [0u8; CUSTOMIZE_SIZE],
        }
    }
}

impl std::fmt::Debug for CustomizeArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CustomizeArray({:02x?})", &self.data[..])
    }
}
