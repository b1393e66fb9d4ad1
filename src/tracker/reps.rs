/// 2閾値ヒステリシスのレップカウンタ
///
/// 角度が down_angle を下回ると「下」、その後 up_angle を上回ると1回。
/// 片側の閾値付近で角度がぶれても二重カウントしない。
#[derive(Debug, Clone)]
pub struct RepCounter {
    down_angle: f32,
    up_angle: f32,
    is_down: bool,
    count: u32,
}

impl RepCounter {
    pub fn new(down_angle: f32, up_angle: f32) -> Self {
        Self { down_angle, up_angle, is_down: false, count: 0 }
    }

    /// 角度を1つ与える。レップが完了したら true
    pub fn update(&mut self, angle: f32) -> bool {
        if !angle.is_finite() {
            return false;
        }
        if angle < self.down_angle && !self.is_down {
            self.is_down = true;
        } else if angle > self.up_angle && self.is_down {
            self.is_down = false;
            self.count += 1;
            return true;
        }
        false
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_down(&self) -> bool {
        self.is_down
    }

    pub fn reset(&mut self) {
        self.is_down = false;
        self.count = 0;
    }
}
