mod test_crop_basic;
mod test_spiral_basic;
