/// A stake standing in snow, rendered as packed RGB.
///
/// Rows above `snow_row` show the stake (columns `stake_x0..stake_x1`)
/// against `background`; rows from `snow_row` down are snow.
#[derive(Clone, Debug)]
pub struct StakeScene {
    pub width: usize,
    pub height: usize,
    pub stake_x0: usize,
    pub stake_x1: usize,
    pub snow_row: usize,
    pub stake: [u8; 3],
    pub background: [u8; 3],
    pub snow: [u8; 3],
}

impl StakeScene {
    pub fn new(width: usize, height: usize, snow_row: usize) -> Self {
        assert!(width > 0 && height > 0, "image dimensions must be positive");
        Self {
            width,
            height,
            stake_x0: width * 2 / 5,
            stake_x1: width * 3 / 5,
            snow_row,
            stake: [40, 40, 40],
            background: [90, 90, 90],
            snow: [235, 235, 235],
        }
    }

    pub fn with_stake_columns(mut self, x0: usize, x1: usize) -> Self {
        self.stake_x0 = x0;
        self.stake_x1 = x1;
        self
    }

    pub fn with_colors(mut self, stake: [u8; 3], background: [u8; 3], snow: [u8; 3]) -> Self {
        self.stake = stake;
        self.background = background;
        self.snow = snow;
        self
    }

    /// Color of the upright scene at a (possibly fractional) point.
    fn color_at(&self, x: f64, y: f64) -> [u8; 3] {
        if y >= self.snow_row as f64 {
            self.snow
        } else if x >= self.stake_x0 as f64 && x < self.stake_x1 as f64 {
            self.stake
        } else {
            self.background
        }
    }

    pub fn render(&self) -> Vec<[u8; 3]> {
        self.render_rolled(0.0, (0.0, 0.0))
    }

    /// The scene as seen by a camera rolled so the stake top leans
    /// `degrees` towards +x, rotating about `pivot` (x, row).
    pub fn render_rolled(&self, degrees: f64, pivot: (f64, f64)) -> Vec<[u8; 3]> {
        let (s, c) = degrees.to_radians().sin_cos();
        let mut img = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let (dx, dy) = (x as f64 - pivot.0, y as f64 - pivot.1);
                // Inverse rotation back into the upright scene.
                let ux = pivot.0 + c * dx + s * dy;
                let uy = pivot.1 - s * dx + c * dy;
                img.push(self.color_at(ux, uy));
            }
        }
        img
    }
}

/// Fills the rectangle `[x0, x1) x [y0, y1)` with `color`.
pub fn paint_rect(
    img: &mut [[u8; 3]],
    width: usize,
    (x0, x1): (usize, usize),
    (y0, y1): (usize, usize),
    color: [u8; 3],
) {
    for y in y0..y1 {
        for x in x0..x1 {
            img[y * width + x] = color;
        }
    }
}

/// Luma of a packed RGB buffer, for grayscale entry points.
pub fn to_gray(img: &[[u8; 3]]) -> Vec<u8> {
    img.iter()
        .map(|p| ((p[0] as u32 + p[1] as u32 + p[2] as u32) / 3) as u8)
        .collect()
}
