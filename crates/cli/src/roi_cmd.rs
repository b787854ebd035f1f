use anyhow::{Context, Result, bail};
use infaq_core::{NormalizedRect, Point, RoiEditor, Viewport};
use infaq_monitor::RoiStore;

use crate::context::AppContext;
use crate::output::print_roi;

/// `1280x720`
pub fn parse_size(raw: &str) -> Result<(f64, f64)> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .with_context(|| format!("Expected <width>x<height>, got {raw:?}"))?;
    Ok((
        w.trim().parse().with_context(|| format!("Bad width in {raw:?}"))?,
        h.trim().parse().with_context(|| format!("Bad height in {raw:?}"))?,
    ))
}

/// `640,360`
pub fn parse_point(raw: &str) -> Result<Point> {
    let (x, y) = raw
        .split_once(',')
        .with_context(|| format!("Expected <x>,<y>, got {raw:?}"))?;
    Ok(Point::new(
        x.trim().parse().with_context(|| format!("Bad x in {raw:?}"))?,
        y.trim().parse().with_context(|| format!("Bad y in {raw:?}"))?,
    ))
}

fn frame_size(frame: Option<&str>) -> Result<Option<(u32, u32)>> {
    frame
        .map(|raw| {
            let (w, h) = parse_size(raw)?;
            Ok((w as u32, h as u32))
        })
        .transpose()
}

pub async fn run_get(ctx: &AppContext, frame: Option<&str>) -> Result<()> {
    let mut store = RoiStore::new(ctx.api.clone());
    match store.load().await {
        Some(rect) => print_roi(&rect, frame_size(frame)?),
        None => println!("No ROI configured."),
    }
    Ok(())
}

pub async fn run_set(ctx: &AppContext, x: f64, y: f64, w: f64, h: f64) -> Result<()> {
    ctx.require_login()?;
    let rect = NormalizedRect::new(x, y, w, h)?;
    let mut store = RoiStore::new(ctx.api.clone());
    let saved = store.save(Some(rect)).await?;
    println!("Saved.");
    print_roi(&saved, None);
    Ok(())
}

/// Replay a pointer drag over a rendered frame and save the result.
pub async fn run_draw(
    ctx: &AppContext,
    viewport: &str,
    offset: Option<&str>,
    from: &str,
    to: &str,
    dry_run: bool,
) -> Result<()> {
    let (width, height) = parse_size(viewport)?;
    let origin = offset.map(parse_point).transpose()?.unwrap_or(Point::new(0.0, 0.0));
    let viewport = Viewport::new(origin.x, origin.y, width, height)?;

    let mut editor = RoiEditor::new(viewport);
    let start = parse_point(from)?;
    let end = parse_point(to)?;
    editor.pointer_down(start);
    editor.pointer_move(end);
    let Some(rect) = editor.pointer_up(end) else {
        bail!("Drag from {from} to {to} is too small to form an ROI");
    };

    print_roi(&rect, Some((width as u32, height as u32)));
    if dry_run {
        return Ok(());
    }
    ctx.require_login()?;
    let mut store = RoiStore::new(ctx.api.clone());
    store.propose(Some(rect));
    store.save_candidate().await?;
    println!("Saved.");
    Ok(())
}

pub async fn run_clear(ctx: &AppContext) -> Result<()> {
    ctx.require_login()?;
    let mut store = RoiStore::new(ctx.api.clone());
    store.clear().await?;
    println!("ROI cleared.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes_and_points() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280.0, 720.0));
        assert_eq!(parse_size("640 X 480").unwrap(), (640.0, 480.0));
        assert!(parse_size("1280").is_err());

        let p = parse_point("12.5, 40").unwrap();
        assert_eq!((p.x, p.y), (12.5, 40.0));
        assert!(parse_point("12;40").is_err());
    }

    #[test]
    fn frame_size_is_optional() {
        assert_eq!(frame_size(None).unwrap(), None);
        assert_eq!(frame_size(Some("640x480")).unwrap(), Some((640, 480)));
    }
}
