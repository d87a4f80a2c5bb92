use crate::braille::BrailleCanvas;

/// Bresenham line
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Line doubled one dot right and one dot down (emphasized outlines)
pub fn draw_thick_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    draw_line(canvas, x0, y0, x1, y1);
    draw_line(canvas, x0 + 1, y0, x1 + 1, y1);
    draw_line(canvas, x0, y0 + 1, x1, y1 + 1);
}

/// Closed outline through projected vertices
pub fn draw_polygon(canvas: &mut BrailleCanvas, points: &[(i32, i32)], thick: bool) {
    if points.len() < 2 {
        return;
    }
    let line = if thick { draw_thick_line } else { draw_line };
    for (i, &(x0, y0)) in points.iter().enumerate() {
        let (x1, y1) = points[(i + 1) % points.len()];
        line(canvas, x0, y0, x1, y1);
    }
}

/// Filled disc
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

/// Annulus of the given outer radius and thickness
pub fn draw_ring(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32, thickness: i32) {
    let inner = (radius - thickness).max(0);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = dx * dx + dy * dy;
            if d2 <= radius * radius && d2 > inner * inner {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line_fills_top_row() {
        let mut canvas = BrailleCanvas::new(5, 1);
        draw_line(&mut canvas, 0, 0, 9, 0);
        assert_eq!(canvas.to_string(), "⠉⠉⠉⠉⠉");
    }

    #[test]
    fn test_polygon_closes_back_to_start() {
        let mut canvas = BrailleCanvas::new(3, 2);
        draw_polygon(&mut canvas, &[(0, 0), (4, 0), (4, 4)], false);
        // Closing edge from (4,4) back to (0,0) passes through (2,2)
        assert!(canvas.cell(1, 0).is_some());
        assert!(canvas.cell(2, 1).is_some());
    }

    #[test]
    fn test_ring_leaves_center_empty() {
        let mut canvas = BrailleCanvas::new(5, 3);
        draw_ring(&mut canvas, 4, 4, 4, 1);
        let mut center = BrailleCanvas::new(5, 3);
        center.set_pixel(4, 4);
        // Cell holding the center dot must not contain the center dot
        let center_bits = center.cell(2, 1).unwrap() as u32 - 0x2800;
        let ring_bits = canvas.cell(2, 1).map(|c| c as u32 - 0x2800).unwrap_or(0);
        assert_eq!(ring_bits & center_bits, 0);
    }

    #[test]
    fn test_circle_is_symmetric() {
        let mut canvas = BrailleCanvas::new(4, 2);
        draw_circle(&mut canvas, 3, 3, 2);
        assert!(canvas.cell(0, 0).is_some());
        assert!(canvas.cell(2, 1).is_some());
    }
}
