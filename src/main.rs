use minimap_nav::map_cal::{LargeMapCache, LargeMapInfo, MapAssets, MapCalculator, image_utils};
use minimap_nav::world::RegionKey;
use std::env;
use std::sync::Arc;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    // Defaults
    let mut mode: Option<&str> = None;
    let mut map_path: Option<String> = None;
    let mut screen_path: Option<String> = None;
    let mut top_path: Option<String> = None;
    let mut bottom_path: Option<String> = None;
    let mut out_path = "stitched.png".to_string();
    let mut strip_height: u32 = 200;

    // Parse all flags (skip program name)
    for arg in args.iter().skip(1) {
        if arg == "--help" || arg == "-h" {
            print_help();
            return;
        } else if arg == "--version" || arg == "-v" {
            println!("minimap-nav v{}", env!("CARGO_PKG_VERSION"));
            return;
        } else if arg == "--locate" {
            mode = Some("locate");
        } else if arg == "--stitch" {
            mode = Some("stitch");
        } else if let Some(rest) = arg.strip_prefix("--map=") {
            map_path = Some(rest.to_string());
        } else if let Some(rest) = arg.strip_prefix("--screen=") {
            screen_path = Some(rest.to_string());
        } else if let Some(rest) = arg.strip_prefix("--top=") {
            top_path = Some(rest.to_string());
        } else if let Some(rest) = arg.strip_prefix("--bottom=") {
            bottom_path = Some(rest.to_string());
        } else if let Some(rest) = arg.strip_prefix("--out=") {
            out_path = rest.to_string();
        } else if let Some(rest) = arg.strip_prefix("--strip=") {
            match rest.parse::<u32>() {
                Ok(h) => strip_height = h,
                Err(_) => {
                    eprintln!("❌ Invalid strip height: {rest}");
                    return;
                }
            }
        } else {
            eprintln!("❌ Unknown argument: {arg}");
            print_help();
            return;
        }
    }

    let result = match mode {
        Some("locate") => match (map_path, screen_path) {
            (Some(map), Some(screen)) => run_locate(&map, &screen),
            _ => {
                eprintln!("❌ --locate needs --map=<png> and --screen=<png>");
                return;
            }
        },
        Some("stitch") => match (top_path, bottom_path) {
            (Some(top), Some(bottom)) => run_stitch(&top, &bottom, &out_path, strip_height),
            _ => {
                eprintln!("❌ --stitch needs --top=<png> and --bottom=<png>");
                return;
            }
        },
        _ => {
            print_help();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

/// Locate a minimap capture (or a full 1920x1080 screenshot) on a large map.
fn run_locate(map_path: &str, screen_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let map = image::open(map_path)?.to_rgb8();
    let screen = image::open(screen_path)?.to_rgb8();
    println!(
        "🗺️ Map {}x{}, capture {}x{}",
        map.width(),
        map.height(),
        screen.width(),
        screen.height()
    );

    let key = RegionKey {
        planet_id: "cli".to_string(),
        region_id: "map".to_string(),
        level: 0,
    };
    let lm = LargeMapInfo::analyse(key, map);
    let mc = MapCalculator::new(Arc::new(LargeMapCache::new()), MapAssets::new("assets/maps"));

    let capture = if screen.dimensions() == (1920, 1080) {
        mc.cut_mini_map(&screen)?
    } else {
        screen
    };
    let mm = mc.analyse_mini_map(capture);

    match mc.cal_character_pos(&lm, &mm, None)? {
        Some(est) => {
            println!(
                "📍 Position ({}, {}) confidence {:.3}",
                est.x, est.y, est.confidence
            );
            if let Some(angle) = est.angle {
                println!("🧭 Heading {angle:.1} degrees");
            }
        }
        None => println!("👀 No confident match on this map"),
    }
    Ok(())
}

/// Stitch two overlapping scroll captures vertically.
fn run_stitch(
    top_path: &str,
    bottom_path: &str,
    out_path: &str,
    strip_height: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let top = image::open(top_path)?.to_rgb8();
    let bottom = image::open(bottom_path)?.to_rgb8();

    let stitched = image_utils::concat_vertically(&top, &bottom, strip_height)?;
    stitched.save(out_path)?;
    println!(
        "✅ Stitched {}x{} saved to {out_path}",
        stitched.width(),
        stitched.height()
    );
    Ok(())
}

fn print_help() {
    println!("🧭 Minimap Navigation Tool");
    println!();
    println!("USAGE:");
    println!("    minimap-nav --locate --map=<png> --screen=<png>");
    println!("    minimap-nav --stitch --top=<png> --bottom=<png> [--out=<png>] [--strip=N]");
    println!();
    println!("FLAGS:");
    println!("    --locate            Locate a capture on a large map image");
    println!("    --map=<png>         Large map image for --locate");
    println!("    --screen=<png>      1920x1080 screenshot or 200x200 minimap capture");
    println!("    --stitch            Stitch two overlapping scroll captures vertically");
    println!("    --top=<png>         Upper capture for --stitch");
    println!("    --bottom=<png>      Lower capture for --stitch");
    println!("    --out=<png>         Output path for --stitch (default: stitched.png)");
    println!("    --strip=N           Overlap decision strip height (default: 200)");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    minimap-nav --locate --map=assets/maps/hs-srcd.png --screen=shot.png");
    println!("    minimap-nav --stitch --top=a.png --bottom=b.png --out=map.png");
}
