/// A weighted input item: a non-negative value and an opaque payload.
#[derive(Clone, Debug)]
pub struct WeightedItem<T> {
    pub value: f64,
    pub payload: T,
}

/// An axis-aligned rectangle. All fields share one arbitrary unit
/// (the app lays out on a 100x100 logical canvas).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A laid-out rectangle bound to its item's payload.
#[derive(Clone, Debug)]
pub struct PositionedItem<T> {
    pub rect: Rect,
    pub payload: T,
}

/// Spacing subtracted between sibling rectangles at each split, in rect units.
pub const GAP: f32 = 0.2;

/// Slice-and-dice treemap layout.
///
/// Recursively bisects `rect` along its longer axis so that each item ends up
/// with an area proportional to its share of the total weight. Each step splits
/// the items at the smallest prefix holding at least half of the remaining
/// weight, clamped so both halves stay non-empty. Input order is preserved
/// within each half; the output order is recursion order (left branch first),
/// not display order.
///
/// Empty input and zero total weight both return an empty vec. A single item
/// occupies the full rect. The gap is subtracted unconditionally, so heavily
/// skewed weights in a small rect can yield near-zero or slightly negative
/// dimensions; rendering code clamps to zero before drawing.
pub fn layout<T>(items: Vec<WeightedItem<T>>, rect: Rect) -> Vec<PositionedItem<T>> {
    let weights: Vec<f64> = items.iter().map(|item| item.value).collect();
    let total: f64 = weights.iter().sum();
    if items.is_empty() || total <= 0.0 {
        return Vec::new();
    }

    let mut placed = Vec::with_capacity(items.len());
    slice(&weights, 0, weights.len(), rect, &mut placed);

    // The recursion emits (index, rect) pairs in its own order; pull each
    // payload out of its slot by index to bind it without cloning.
    let mut payloads: Vec<Option<T>> = items.into_iter().map(|item| Some(item.payload)).collect();
    placed
        .into_iter()
        .filter_map(|(index, rect)| {
            payloads[index]
                .take()
                .map(|payload| PositionedItem { rect, payload })
        })
        .collect()
}

fn slice(weights: &[f64], start: usize, end: usize, rect: Rect, out: &mut Vec<(usize, Rect)>) {
    if start >= end {
        return;
    }
    if end - start == 1 {
        out.push((start, rect));
        return;
    }

    let total: f64 = weights[start..end].iter().sum();

    // Smallest prefix holding at least half the weight. Clamped to keep both
    // halves non-empty when a single item dominates the range.
    let mut sum = 0.0;
    let mut split = start;
    for (i, &w) in weights[start..end].iter().enumerate() {
        sum += w;
        if sum >= total / 2.0 {
            split = start + i + 1;
            break;
        }
    }
    let split = split.clamp(start + 1, end - 1);

    let left_sum: f64 = weights[start..split].iter().sum();
    // An all-zero range still gets tiled; the left half collapses to the gap.
    let left_share = if total > 0.0 {
        (left_sum / total) as f32
    } else {
        0.0
    };

    let (left_rect, right_rect) = if rect.width >= rect.height {
        let left_width = rect.width * left_share - GAP / 2.0;
        (
            Rect {
                width: left_width,
                ..rect
            },
            Rect {
                x: rect.x + left_width + GAP,
                width: rect.width - left_width - GAP,
                ..rect
            },
        )
    } else {
        let left_height = rect.height * left_share - GAP / 2.0;
        (
            Rect {
                height: left_height,
                ..rect
            },
            Rect {
                y: rect.y + left_height + GAP,
                height: rect.height - left_height - GAP,
                ..rect
            },
        )
    };

    slice(weights, start, split, left_rect, out);
    slice(weights, split, end, right_rect, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(value: f64, payload: &str) -> WeightedItem<&str> {
        WeightedItem { value, payload }
    }

    fn canvas(width: f32, height: f32) -> Rect {
        Rect {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    fn area(rect: &Rect) -> f32 {
        rect.width * rect.height
    }

    fn find<'a>(out: &'a [PositionedItem<&str>], payload: &str) -> &'a PositionedItem<&'a str> {
        out.iter()
            .find(|p| p.payload == payload)
            .expect("payload missing from layout")
    }

    #[test]
    fn empty_input_yields_no_rects() {
        let out = layout(Vec::<WeightedItem<&str>>::new(), canvas(100.0, 100.0));
        assert!(out.is_empty());
    }

    #[test]
    fn zero_total_weight_yields_no_rects() {
        let items = vec![item(0.0, "a"), item(0.0, "b")];
        let out = layout(items, canvas(100.0, 100.0));
        assert!(out.is_empty());
    }

    #[test]
    fn single_item_fills_the_rect() {
        let rect = Rect {
            x: 12.0,
            y: 7.5,
            width: 80.0,
            height: 45.0,
        };
        let out = layout(vec![item(3.0, "only")], rect);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rect, rect);
        assert_eq!(out[0].payload, "only");
    }

    #[test]
    fn two_items_split_along_the_wide_axis() {
        let items = vec![item(60.0, "a"), item(40.0, "b")];
        let out = layout(items, canvas(100.0, 50.0));
        assert_eq!(out.len(), 2);

        let a = find(&out, "a");
        let b = find(&out, "b");

        // Wide rect: side-by-side halves, full height each.
        assert_eq!(a.rect.height, 50.0);
        assert_eq!(b.rect.height, 50.0);
        assert!((a.rect.x - 0.0).abs() < 1e-4);
        assert!((a.rect.width - 59.9).abs() < 1e-3);
        assert!((b.rect.x - 60.1).abs() < 1e-3);
        assert!((b.rect.width - 39.9).abs() < 1e-3);

        // Widths sum to the canvas minus one gap, in a 60:40 ratio.
        assert!((a.rect.width + b.rect.width - (100.0 - GAP)).abs() < 1e-3);
        assert!((a.rect.width / b.rect.width - 1.5).abs() < 0.01);
    }

    #[test]
    fn tall_rect_splits_vertically() {
        let items = vec![item(1.0, "top"), item(1.0, "bottom")];
        let out = layout(items, canvas(40.0, 100.0));

        let top = find(&out, "top");
        let bottom = find(&out, "bottom");
        assert_eq!(top.rect.width, 40.0);
        assert_eq!(bottom.rect.width, 40.0);
        assert!(top.rect.y < bottom.rect.y);
        assert!(bottom.rect.y >= top.rect.y + top.rect.height);
    }

    #[test]
    fn five_equal_items_tile_the_square() {
        let items: Vec<WeightedItem<usize>> = (0..5)
            .map(|i| WeightedItem {
                value: 20.0,
                payload: i,
            })
            .collect();
        let out = layout(items, canvas(100.0, 100.0));
        assert_eq!(out.len(), 5);

        for placed in &out {
            let cell_area = area(&placed.rect);
            assert!(
                (cell_area - 2000.0).abs() < 50.0,
                "item {} area {cell_area} too far from 2000",
                placed.payload
            );
            assert!(placed.rect.x >= 0.0 && placed.rect.y >= 0.0);
            assert!(placed.rect.x + placed.rect.width <= 100.0 + 1e-3);
            assert!(placed.rect.y + placed.rect.height <= 100.0 + 1e-3);
        }
    }

    #[test]
    fn larger_weight_gets_larger_area() {
        let items = vec![item(70.0, "big"), item(30.0, "small")];
        let out = layout(items, canvas(90.0, 60.0));
        assert!(area(&find(&out, "big").rect) > area(&find(&out, "small").rect));
    }

    #[test]
    fn dominant_item_still_leaves_both_halves_nonempty() {
        // One item holds nearly the whole total; the split index must stay in
        // [1, n-1] at every level so every item still gets a rect.
        let mut items = vec![item(1.0e9, "dominant")];
        for _ in 0..5 {
            items.push(item(1.0e-6, "tail"));
        }
        let out = layout(items, canvas(100.0, 100.0));
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn zero_weight_item_among_nonzero_is_still_emitted() {
        let items = vec![item(5.0, "a"), item(0.0, "empty"), item(5.0, "b")];
        let out = layout(items, canvas(100.0, 100.0));
        assert_eq!(out.len(), 3);
        // Zero weight collapses to (at most) gap-sized leftovers.
        assert!(area(&find(&out, "empty").rect) < 25.0);
    }

    #[test]
    fn areas_sum_to_canvas_area_minus_gap_losses() {
        let items = vec![
            item(50.0, "a"),
            item(25.0, "b"),
            item(15.0, "c"),
            item(10.0, "d"),
        ];
        let out = layout(items, canvas(100.0, 100.0));
        let covered: f32 = out.iter().map(|p| area(&p.rect)).sum();
        // Three splits, each losing a gap-wide strip.
        assert!(covered <= 10_000.0);
        assert!(covered > 10_000.0 * 0.98);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_cardinality_matches_input(
                weights in prop::collection::vec(0.1f64..1000.0, 1..40)
            ) {
                let items: Vec<WeightedItem<usize>> = weights
                    .iter()
                    .enumerate()
                    .map(|(i, &w)| WeightedItem { value: w, payload: i })
                    .collect();
                let out = layout(items, canvas(1000.0, 800.0));
                prop_assert_eq!(out.len(), weights.len());

                let mut seen: Vec<usize> = out.iter().map(|p| p.payload).collect();
                seen.sort_unstable();
                let expected: Vec<usize> = (0..weights.len()).collect();
                prop_assert_eq!(seen, expected);
            }

            #[test]
            fn prop_area_tracks_weight_share(
                weights in prop::collection::vec(0.5f64..1000.0, 2..10)
            ) {
                let total: f64 = weights.iter().sum();
                let items: Vec<WeightedItem<usize>> = weights
                    .iter()
                    .enumerate()
                    .map(|(i, &w)| WeightedItem { value: w, payload: i })
                    .collect();
                let out = layout(items, canvas(1000.0, 800.0));
                // On a large canvas the gap deduction is negligible, so each
                // item's area share stays close to its weight share.
                for placed in &out {
                    let area_share = f64::from(area(&placed.rect)) / (1000.0 * 800.0);
                    let weight_share = weights[placed.payload] / total;
                    prop_assert!((area_share - weight_share).abs() < 0.01);
                }
            }

            #[test]
            fn prop_skewed_weights_terminate_with_full_output(n in 2usize..60) {
                let mut items: Vec<WeightedItem<usize>> =
                    vec![WeightedItem { value: 1.0e12, payload: 0 }];
                for i in 1..n {
                    items.push(WeightedItem { value: 1.0e-9, payload: i });
                }
                let out = layout(items, canvas(100.0, 100.0));
                prop_assert_eq!(out.len(), n);
            }
        }
    }
}
