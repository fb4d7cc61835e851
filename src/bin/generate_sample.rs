use std::path::PathBuf;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

const WIDTH: u32 = 240;
const HEIGHT: u32 = 160;
const CORNER: u32 = 50;

/// Mask colors handed out to objects, unique within an image.
const MASK_COLORS: [[u8; 3]; 6] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `lo..hi`.
    fn range(&mut self, lo: u32, hi: u32) -> u32 {
        lo + (self.next_f64() * (hi - lo) as f64) as u32
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Axis-aligned block `[x0, x1) × [y0, y1)`.
struct Block {
    name: String,
    color: [u8; 3],
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    class: u8,
}

impl Block {
    fn contains(&self, x: u32, y: u32) -> bool {
        (self.x0..self.x1).contains(&x) && (self.y0..self.y1).contains(&y)
    }
}

/// A large centered object (mostly important) and a few small corner
/// objects (mostly unimportant). Regions never overlap, so every color
/// appears in the mask.
fn layout_image(rng: &mut SimpleRng) -> Vec<Block> {
    let mut colors: Vec<[u8; 3]> = MASK_COLORS.to_vec();
    let mut take_color =
        |rng: &mut SimpleRng| colors.remove(rng.range(0, colors.len() as u32) as usize);

    let mut blocks = Vec::new();

    let half_w = rng.range(15, 60);
    let half_h = rng.range(10, 30);
    let (cx, cy) = (WIDTH / 2 + rng.range(0, 10) - 5, HEIGHT / 2);
    blocks.push(Block {
        name: "subject".to_string(),
        color: take_color(rng),
        x0: cx - half_w,
        y0: cy - half_h,
        x1: cx + half_w,
        y1: cy + half_h,
        class: if rng.chance(0.9) { 1 } else { 0 },
    });

    let corners = [
        (0, 0),
        (WIDTH - CORNER, 0),
        (0, HEIGHT - CORNER),
        (WIDTH - CORNER, HEIGHT - CORNER),
    ];
    for (i, (ox, oy)) in corners.into_iter().enumerate() {
        if !rng.chance(0.6) {
            continue;
        }
        let w = rng.range(4, CORNER);
        let h = rng.range(4, CORNER);
        let x0 = ox + rng.range(0, CORNER - w + 1);
        let y0 = oy + rng.range(0, CORNER - h + 1);
        blocks.push(Block {
            name: format!("clutter{}", i + 1),
            color: take_color(rng),
            x0,
            y0,
            x1: x0 + w,
            y1: y0 + h,
            class: if rng.chance(0.9) { 0 } else { 1 },
        });
    }
    blocks
}

fn render(blocks: &[Block], rng: &mut SimpleRng) -> (RgbImage, RgbImage) {
    let mask = RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        blocks
            .iter()
            .find(|b| b.contains(x, y))
            .map(|b| Rgb(b.color))
            .unwrap_or(Rgb([0, 0, 0]))
    });

    // Source: muted object colors over a gradient, with pixel noise.
    let mut source = RgbImage::new(WIDTH, HEIGHT);
    for (x, y, px) in source.enumerate_pixels_mut() {
        let base = match blocks.iter().find(|b| b.contains(x, y)) {
            Some(b) => b.color.map(|c| c / 2 + 60),
            None => {
                let g = (40 + y * 80 / HEIGHT) as u8;
                [g, g, g + 20]
            }
        };
        let noise = (rng.next_f64() * 16.0) as u8;
        *px = Rgb(base.map(|c| c.saturating_add(noise)));
    }
    (source, mask)
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "sample_data".to_string()));
    let n_images: u32 = match args.next() {
        Some(n) => n.parse().context("image count must be a positive integer")?,
        None => 40,
    };

    let img_dir = out_dir.join("imgs");
    let msk_dir = img_dir.join("msk");
    std::fs::create_dir_all(&msk_dir)
        .with_context(|| format!("creating {}", msk_dir.display()))?;

    let table_path = out_dir.join("img_importance.csv");
    let mut table = csv::Writer::from_path(&table_path)
        .with_context(|| format!("creating {}", table_path.display()))?;
    table.write_record(["num_objs", "img_name", "obj_name", "R", "G", "B", "class"])?;

    let mut rng = SimpleRng::new(42);
    let mut n_objects = 0;

    for i in 1..=n_images {
        let img_name = format!("img{i}");
        let blocks = layout_image(&mut rng);
        let (source, mask) = render(&blocks, &mut rng);

        source
            .save(img_dir.join(format!("{img_name}.bmp")))
            .with_context(|| format!("writing {img_name}.bmp"))?;
        mask.save(msk_dir.join(format!("{img_name}_msk.bmp")))
            .with_context(|| format!("writing {img_name}_msk.bmp"))?;

        for block in &blocks {
            let [r, g, b] = block.color;
            table.write_record([
                blocks.len().to_string(),
                img_name.clone(),
                block.name.clone(),
                r.to_string(),
                g.to_string(),
                b.to_string(),
                block.class.to_string(),
            ])?;
        }
        n_objects += blocks.len();
    }
    table.flush()?;

    println!(
        "Wrote {n_objects} objects in {n_images} images to {}",
        out_dir.display()
    );
    println!(
        "Try: importance-map {} --headless --split-image {}",
        table_path.display(),
        n_images / 2
    );
    Ok(())
}
